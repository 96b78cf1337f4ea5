use crate::error::StoreError;
use crate::models::{ChunkRecord, ScoredChunk};
use crate::traits::VectorStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const SNAPSHOT_FILE: &str = "chunks.json";

/// Cosine-similarity store held in memory, optionally snapshotted to a
/// JSON file under a data directory so a corpus survives restarts.
pub struct MemoryStore {
    chunks: RwLock<HashMap<String, ChunkRecord>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Ephemeral store, nothing touches disk.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// Persistent store rooted at `data_dir`. Creates the directory if it
    /// does not exist and reloads any previous snapshot found there.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let snapshot_path = data_dir.join(SNAPSHOT_FILE);

        let chunks = if snapshot_path.exists() {
            serde_json::from_str(&fs::read_to_string(&snapshot_path)?)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            chunks: RwLock::new(chunks),
            snapshot_path: Some(snapshot_path),
        })
    }

    fn persist(&self, chunks: &HashMap<String, ChunkRecord>) -> Result<(), StoreError> {
        if let Some(path) = &self.snapshot_path {
            fs::write(path, serde_json::to_string(chunks)?)?;
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot: f64 = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    let left_norm: f64 = left.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
    let right_norm: f64 = right.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.chunks.read().await.len())
    }

    async fn insert(&self, record: ChunkRecord) -> Result<(), StoreError> {
        let mut chunks = self.chunks.write().await;
        chunks.insert(record.id.clone(), record);
        self.persist(&chunks)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let chunks = self.chunks.read().await;

        let mut hits: Vec<ScoredChunk> = chunks
            .values()
            .map(|record| ScoredChunk {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(&record.embedding, embedding),
            })
            .collect();

        // Ties break on id so the ranking is reproducible.
        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.id.cmp(&right.id))
        });
        hits.truncate(k);

        Ok(hits)
    }
}
