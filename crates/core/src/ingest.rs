use crate::chunking::{chunk_id, chunk_windows, normalize_page_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::{ChunkMetadata, ChunkRecord, DocumentFingerprint, IngestionOptions};
use crate::traits::VectorStore;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    // Filesystem order is not stable; sort so runs are reproducible.
    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct SkippedPage {
    pub doc_name: String,
    pub page_number: u32,
    pub reason: String,
}

#[derive(Debug)]
pub struct SkippedChunk {
    pub chunk_id: String,
    pub reason: String,
}

/// What one ingestion run did, unit by unit. Skips are recorded rather
/// than surfaced as errors so one bad document cannot block the corpus.
#[derive(Debug)]
pub struct IngestionReport {
    pub documents: Vec<DocumentFingerprint>,
    pub chunks_inserted: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub skipped_pages: Vec<SkippedPage>,
    pub skipped_chunks: Vec<SkippedChunk>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum IngestionOutcome {
    /// The store already held chunks; nothing was read or written.
    AlreadyPopulated { existing: usize },
    Completed(IngestionReport),
}

/// Populates a vector store from a directory of PDFs, exactly once.
///
/// The store's chunk count is the only gate: a nonzero count means a prior
/// run finished (or at least started), and the whole run is skipped.
pub struct IngestionPipeline<X, E, S> {
    extractor: X,
    embedder: E,
    store: S,
    config: ChunkingConfig,
}

impl<X, E, S> IngestionPipeline<X, E, S>
where
    X: PdfExtractor,
    E: Embedder,
    S: VectorStore,
{
    pub fn new(
        extractor: X,
        embedder: E,
        store: S,
        options: &IngestionOptions,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            config: ChunkingConfig::try_from(options)?,
            extractor,
            embedder,
            store,
        })
    }

    pub async fn run(&self, resource_dir: &Path) -> Result<IngestionOutcome, IngestError> {
        let existing = self.store.count().await?;
        if existing > 0 {
            info!(existing, "store already populated, skipping ingestion");
            return Ok(IngestionOutcome::AlreadyPopulated { existing });
        }

        let files = discover_pdf_files(resource_dir);
        if files.is_empty() {
            return Err(IngestError::NoPdfFiles(resource_dir.display().to_string()));
        }

        let mut documents = Vec::new();
        let mut chunks_inserted = 0usize;
        let mut skipped_files = Vec::new();
        let mut skipped_pages = Vec::new();
        let mut skipped_chunks = Vec::new();

        for path in files {
            let fingerprint = match build_document_fingerprint(&path) {
                Ok(fingerprint) => fingerprint,
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable file");
                    skipped_files.push(SkippedFile {
                        path,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            info!(path = %path.display(), "processing file");
            let extracted = match self.extractor.extract_pages(&path) {
                Ok(extracted) => extracted,
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unparseable pdf");
                    skipped_files.push(SkippedFile {
                        path,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            for failed in extracted.failed {
                warn!(
                    doc = %fingerprint.doc_name,
                    page = failed.number,
                    reason = %failed.reason,
                    "skipping page"
                );
                skipped_pages.push(SkippedPage {
                    doc_name: fingerprint.doc_name.clone(),
                    page_number: failed.number,
                    reason: failed.reason,
                });
            }

            for page in extracted.pages {
                let normalized = normalize_page_text(&page.text);
                if normalized.is_empty() {
                    continue;
                }

                for window in chunk_windows(&normalized, self.config) {
                    let id = chunk_id(&fingerprint.doc_name, page.number, window.next_start);

                    let embedding = match self.embedder.embed(&window.text).await {
                        Ok(embedding) => embedding,
                        Err(error) => {
                            warn!(chunk = %id, %error, "skipping chunk, embedding failed");
                            skipped_chunks.push(SkippedChunk {
                                chunk_id: id,
                                reason: error.to_string(),
                            });
                            continue;
                        }
                    };

                    // A broken store makes the rest of the run meaningless:
                    // insert failures abort instead of being recorded.
                    self.store
                        .insert(ChunkRecord {
                            id,
                            text: window.text,
                            metadata: ChunkMetadata {
                                doc_name: fingerprint.doc_name.clone(),
                                page_number: page.number,
                            },
                            embedding,
                        })
                        .await?;
                    chunks_inserted += 1;
                }
            }

            documents.push(fingerprint);
        }

        info!(
            documents = documents.len(),
            chunks_inserted,
            skipped_files = skipped_files.len(),
            "ingestion finished"
        );

        Ok(IngestionOutcome::Completed(IngestionReport {
            documents,
            chunks_inserted,
            skipped_files,
            skipped_pages,
            skipped_chunks,
            finished_at: Utc::now(),
        }))
    }
}

fn build_document_fingerprint(path: &Path) -> Result<DocumentFingerprint, IngestError> {
    let checksum = digest_file(path)?;
    let doc_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    Ok(DocumentFingerprint {
        doc_name: doc_name.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        ingested_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbedError, StoreError};
    use crate::extractor::{ExtractedPages, FailedPage, PageText};
    use crate::models::ScoredChunk;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Maps file names to canned pages, so tests never need a real PDF.
    #[derive(Default)]
    struct FakeExtractor {
        pages_by_file: HashMap<String, ExtractedPages>,
    }

    impl FakeExtractor {
        fn with_pages(mut self, file: &str, pages: ExtractedPages) -> Self {
            self.pages_by_file.insert(file.to_string(), pages);
            self
        }
    }

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<ExtractedPages, IngestError> {
            let name = path.file_name().unwrap().to_str().unwrap();
            self.pages_by_file
                .get(name)
                .cloned()
                .ok_or_else(|| IngestError::PdfParse(format!("no fake pages for {name}")))
        }
    }

    /// Counts calls; fails for texts containing the poison marker.
    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        poison: Option<String>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(poison) = &self.poison {
                if text.contains(poison.as_str()) {
                    return Err(EmbedError::Request("poisoned text".to_string()));
                }
            }
            Ok(vec![1.0, 0.0])
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        records: Mutex<Vec<ChunkRecord>>,
        preloaded: usize,
        fail_inserts: bool,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn count(&self) -> Result<usize, StoreError> {
            Ok(self.preloaded + self.records.lock().unwrap().len())
        }

        async fn insert(&self, record: ChunkRecord) -> Result<(), StoreError> {
            if self.fail_inserts {
                return Err(StoreError::BackendResponse {
                    backend: "fake".to_string(),
                    details: "insert refused".to_string(),
                });
            }
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn query(&self, _: &[f32], _: usize) -> Result<Vec<ScoredChunk>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn single_page(text: &str) -> ExtractedPages {
        ExtractedPages {
            pages: vec![PageText {
                number: 1,
                text: text.to_string(),
            }],
            failed: Vec::new(),
        }
    }

    fn options(chunk_size: usize, overlap: usize) -> IngestionOptions {
        IngestionOptions {
            chunk_size,
            overlap,
        }
    }

    fn touch_pdf(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"%PDF-1.4\n%fake").unwrap();
    }

    #[test]
    fn discover_pdf_files_is_recursive_and_sorted() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch_pdf(dir.path(), "b.pdf");
        touch_pdf(&nested, "a.pdf");
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let files = discover_pdf_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn checksum_is_reproducible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(digest_file(&path).unwrap(), digest_file(&path).unwrap());
    }

    #[test]
    fn invalid_overlap_is_rejected_before_any_processing() {
        let result = IngestionPipeline::new(
            FakeExtractor::default(),
            CountingEmbedder::default(),
            RecordingStore::default(),
            &options(10, 10),
        );
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }

    #[tokio::test]
    async fn empty_resource_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let pipeline = IngestionPipeline::new(
            FakeExtractor::default(),
            CountingEmbedder::default(),
            RecordingStore::default(),
            &options(10, 3),
        )
        .unwrap();

        let result = pipeline.run(dir.path()).await;
        assert!(matches!(result, Err(IngestError::NoPdfFiles(_))));
    }

    #[tokio::test]
    async fn populated_store_skips_everything() {
        let dir = tempdir().unwrap();
        touch_pdf(dir.path(), "doc.pdf");

        let pipeline = IngestionPipeline::new(
            FakeExtractor::default().with_pages("doc.pdf", single_page("some text")),
            CountingEmbedder::default(),
            RecordingStore {
                preloaded: 42,
                ..Default::default()
            },
            &options(10, 3),
        )
        .unwrap();

        let outcome = pipeline.run(dir.path()).await.unwrap();
        assert!(matches!(
            outcome,
            IngestionOutcome::AlreadyPopulated { existing: 42 }
        ));
        assert_eq!(pipeline.embedder.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunk_ids_follow_the_offset_scheme() {
        let dir = tempdir().unwrap();
        touch_pdf(dir.path(), "doc.pdf");

        let pipeline = IngestionPipeline::new(
            FakeExtractor::default().with_pages("doc.pdf", single_page("abcdefghijklmno")),
            CountingEmbedder::default(),
            RecordingStore::default(),
            &options(10, 3),
        )
        .unwrap();

        let outcome = pipeline.run(dir.path()).await.unwrap();
        let IngestionOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(report.chunks_inserted, 2);
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].doc_name, "doc.pdf");

        let records = pipeline.store.records.lock().unwrap();
        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["doc.pdf_page1_chunk7", "doc.pdf_page1_chunk14"]);
        assert_eq!(records[0].metadata.doc_name, "doc.pdf");
        assert_eq!(records[0].metadata.page_number, 1);
        assert_eq!(records[0].text, "abcdefghij");
    }

    #[tokio::test]
    async fn blank_pages_trigger_no_embedding_calls() {
        let dir = tempdir().unwrap();
        touch_pdf(dir.path(), "doc.pdf");

        let pipeline = IngestionPipeline::new(
            FakeExtractor::default().with_pages(
                "doc.pdf",
                ExtractedPages {
                    pages: vec![
                        PageText {
                            number: 1,
                            text: " \n \n ".to_string(),
                        },
                        PageText {
                            number: 2,
                            text: "real content".to_string(),
                        },
                    ],
                    failed: Vec::new(),
                },
            ),
            CountingEmbedder::default(),
            RecordingStore::default(),
            &options(100, 10),
        )
        .unwrap();

        pipeline.run(dir.path()).await.unwrap();

        assert_eq!(pipeline.embedder.calls.load(Ordering::SeqCst), 1);
        let records = pipeline.store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.page_number, 2);
    }

    #[tokio::test]
    async fn unparseable_file_is_skipped_and_the_rest_ingested() {
        let dir = tempdir().unwrap();
        touch_pdf(dir.path(), "bad.pdf");
        touch_pdf(dir.path(), "good.pdf");

        // FakeExtractor has no entry for bad.pdf, so it fails to extract.
        let pipeline = IngestionPipeline::new(
            FakeExtractor::default().with_pages("good.pdf", single_page("short text")),
            CountingEmbedder::default(),
            RecordingStore::default(),
            &options(100, 10),
        )
        .unwrap();

        let outcome = pipeline.run(dir.path()).await.unwrap();
        let IngestionOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };

        assert_eq!(report.skipped_files.len(), 1);
        assert!(report.skipped_files[0].path.ends_with("bad.pdf"));
        assert_eq!(report.chunks_inserted, 1);
        assert_eq!(report.documents.len(), 1);
    }

    #[tokio::test]
    async fn failed_pages_are_recorded_and_the_rest_processed() {
        let dir = tempdir().unwrap();
        touch_pdf(dir.path(), "doc.pdf");

        let pipeline = IngestionPipeline::new(
            FakeExtractor::default().with_pages(
                "doc.pdf",
                ExtractedPages {
                    pages: vec![PageText {
                        number: 2,
                        text: "page two survived".to_string(),
                    }],
                    failed: vec![FailedPage {
                        number: 1,
                        reason: "garbled stream".to_string(),
                    }],
                },
            ),
            CountingEmbedder::default(),
            RecordingStore::default(),
            &options(100, 10),
        )
        .unwrap();

        let outcome = pipeline.run(dir.path()).await.unwrap();
        let IngestionOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };

        assert_eq!(report.skipped_pages.len(), 1);
        assert_eq!(report.skipped_pages[0].page_number, 1);
        assert_eq!(report.chunks_inserted, 1);
    }

    #[tokio::test]
    async fn embedding_failure_skips_only_that_chunk() {
        let dir = tempdir().unwrap();
        touch_pdf(dir.path(), "doc.pdf");

        // chunk_size 10 / overlap 3 over 15 chars: two windows, the first
        // one poisoned.
        let pipeline = IngestionPipeline::new(
            FakeExtractor::default().with_pages("doc.pdf", single_page("abcdefghijklmno")),
            CountingEmbedder {
                poison: Some("abc".to_string()),
                ..Default::default()
            },
            RecordingStore::default(),
            &options(10, 3),
        )
        .unwrap();

        let outcome = pipeline.run(dir.path()).await.unwrap();
        let IngestionOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };

        assert_eq!(report.skipped_chunks.len(), 1);
        assert_eq!(report.skipped_chunks[0].chunk_id, "doc.pdf_page1_chunk7");
        assert_eq!(report.chunks_inserted, 1);

        let records = pipeline.store.records.lock().unwrap();
        assert_eq!(records[0].id, "doc.pdf_page1_chunk14");
    }

    #[tokio::test]
    async fn store_failure_aborts_the_run() {
        let dir = tempdir().unwrap();
        touch_pdf(dir.path(), "doc.pdf");

        let pipeline = IngestionPipeline::new(
            FakeExtractor::default().with_pages("doc.pdf", single_page("some text")),
            CountingEmbedder::default(),
            RecordingStore {
                fail_inserts: true,
                ..Default::default()
            },
            &options(100, 10),
        )
        .unwrap();

        let result = pipeline.run(dir.path()).await;
        assert!(matches!(result, Err(IngestError::Store(_))));
    }
}
