use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Maps text to a fixed-length vector. Repeated calls on the same text must
/// produce comparable vectors; ingestion and query embeddings go through
/// the same implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text).await
    }
}

/// Embedder backed by an Ollama server's `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    endpoint: Url,
    model: String,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            model: model.into(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = self.endpoint.join("api/embeddings")?;
        let response = self
            .client
            .post(url)
            .json(&EmbeddingsRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbedError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: EmbeddingsResponse = response.json().await?;
        if payload.embedding.is_empty() {
            return Err(EmbedError::Request(format!(
                "model {} returned an empty embedding",
                self.model
            )));
        }

        Ok(payload.embedding)
    }
}

/// Deterministic local embedder: character trigrams hashed into a
/// fixed-size bucket histogram, l2-normalized. Not semantically meaningful,
/// but stable across calls, which is all tests and offline runs need.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
}

pub const DEFAULT_NGRAM_DIMENSIONS: usize = 256;

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_NGRAM_DIMENSIONS)
    }
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut buckets = vec![0f32; self.dimensions];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for trigram in chars.windows(3) {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            trigram.hash(&mut hasher);
            let bucket = (hasher.finish() % buckets.len() as u64) as usize;
            buckets[bucket] += 1.0;
        }

        let magnitude = buckets.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut buckets {
                *value /= magnitude;
            }
        }

        buckets
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed_sync(text))
    }
}
