use crate::embeddings::Embedder;
use crate::error::RetrieveError;
use crate::models::ScoredChunk;
use crate::traits::VectorStore;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 3;

/// Read path: query text in, the store's top-k chunks out. Never mutates
/// the store, never reorders or deduplicates the store's ranking.
pub struct RetrievalService<E, S> {
    embedder: E,
    store: S,
}

impl<E, S> RetrievalService<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    pub fn new(embedder: E, store: S) -> Self {
        Self { embedder, store }
    }

    /// Embeds `query_text` and returns up to `top_k` ranked chunks. An
    /// empty store yields an empty list, not an error; embedding and store
    /// failures propagate, since a failed query has no safe partial answer.
    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrieveError> {
        if query_text.trim().is_empty() {
            return Err(RetrieveError::EmptyQuery);
        }

        let embedding = self.embedder.embed(query_text).await?;
        let hits = self.store.query(&embedding, top_k).await?;

        debug!(top_k, hits = hits.len(), "retrieval complete");
        Ok(hits)
    }
}
