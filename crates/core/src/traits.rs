use crate::error::StoreError;
use crate::models::{ChunkRecord, ScoredChunk};
use async_trait::async_trait;
use std::sync::Arc;

/// Durable nearest-neighbor index. The store owns ranking: `query` returns
/// its best hits first by its own similarity metric, and callers preserve
/// that order.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Inserts one chunk. Inserting an id that already exists overwrites
    /// the stored record.
    async fn insert(&self, record: ChunkRecord) -> Result<(), StoreError>;

    /// Returns up to `k` stored chunks closest to `embedding`, best first.
    /// A store holding fewer than `k` chunks returns what it has.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError>;
}

#[async_trait]
impl<S: VectorStore + ?Sized> VectorStore for Arc<S> {
    async fn count(&self) -> Result<usize, StoreError> {
        (**self).count().await
    }

    async fn insert(&self, record: ChunkRecord) -> Result<(), StoreError> {
        (**self).insert(record).await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        (**self).query(embedding, k).await
    }
}
