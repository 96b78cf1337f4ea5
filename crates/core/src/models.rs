use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Citation payload stored alongside every chunk: enough to point a reader
/// at the source page, but not the offset range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub doc_name: String,
    pub page_number: u32,
}

/// The insert payload handed to a vector store. The store owns the record
/// once the insert returns; inserting the same id again overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// One ranked hit from a vector store query. Rank order is assigned by the
/// store and must be preserved by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub doc_name: String,
    pub source_path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 3_000,
            overlap: 500,
        }
    }
}
