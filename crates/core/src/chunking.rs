use crate::error::IngestError;
use crate::models::IngestionOptions;

/// Window parameters validated once, before any processing starts.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}, \
                 otherwise the window never advances"
            )));
        }

        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl TryFrom<&IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(options: &IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(options.chunk_size, options.overlap)
    }
}

/// Collapses newlines to spaces and trims surrounding whitespace. Pages
/// that normalize to an empty string are skipped before chunking.
pub fn normalize_page_text(text: &str) -> String {
    text.replace('\n', " ").trim().to_string()
}

/// One window over a page's normalized text.
///
/// `next_start` is the character offset where the following window begins
/// (`start + chunk_size - overlap`), not this window's own start. Chunk ids
/// embed that offset; stores written by earlier versions of this pipeline
/// depend on the format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWindow {
    pub text: String,
    pub next_start: usize,
}

/// Lazily emits fixed-size overlapping windows over `text`. Offsets count
/// characters, matching the id scheme of existing stores. Each call starts
/// from the beginning; there is no shared cursor.
pub fn chunk_windows(text: &str, config: ChunkingConfig) -> ChunkWindows {
    ChunkWindows {
        chars: text.chars().collect(),
        start: 0,
        exhausted: false,
        config,
    }
}

pub struct ChunkWindows {
    chars: Vec<char>,
    start: usize,
    exhausted: bool,
    config: ChunkingConfig,
}

impl Iterator for ChunkWindows {
    type Item = ChunkWindow;

    fn next(&mut self) -> Option<ChunkWindow> {
        if self.exhausted || self.chars.is_empty() {
            return None;
        }

        let end = (self.start + self.config.chunk_size).min(self.chars.len());
        let text: String = self.chars[self.start..end].iter().collect();
        let next_start = self.start + self.config.chunk_size - self.config.overlap;

        if end == self.chars.len() {
            self.exhausted = true;
        } else {
            self.start = next_start;
        }

        Some(ChunkWindow { text, next_start })
    }
}

pub fn chunk_id(doc_name: &str, page_number: u32, next_start: usize) -> String {
    format!("{doc_name}_page{page_number}_chunk{next_start}")
}
