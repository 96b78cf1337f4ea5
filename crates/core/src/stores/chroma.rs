use crate::error::StoreError;
use crate::models::{ChunkMetadata, ChunkRecord, ScoredChunk};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Vector store backed by a Chroma server's REST API. Scores are Chroma's
/// distances: smaller is closer, and hits come back ranked ascending.
pub struct ChromaStore {
    endpoint: Url,
    collection_id: String,
    client: Client,
}

impl ChromaStore {
    /// Resolves (or creates) the named collection and returns a handle
    /// bound to its id.
    pub async fn connect(
        endpoint: &str,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder().timeout(timeout).build()?;

        let response = client
            .post(endpoint.join("api/v1/collections")?)
            .json(&json!({ "name": collection, "get_or_create": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        let collection_id = payload
            .pointer("/id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: "collection response has no id".to_string(),
            })?
            .to_string();

        Ok(Self {
            endpoint,
            collection_id,
            client,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, StoreError> {
        Ok(self
            .endpoint
            .join(&format!("api/v1/collections/{}/{suffix}", self.collection_id))?)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn count(&self) -> Result<usize, StoreError> {
        let response = self.client.get(self.collection_url("count")?).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        payload
            .as_u64()
            .map(|count| count as usize)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: "count response is not a number".to_string(),
            })
    }

    async fn insert(&self, record: ChunkRecord) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.collection_url("add")?)
            .json(&json!({
                "ids": [record.id],
                "embeddings": [record.embedding],
                "documents": [record.text],
                "metadatas": [{
                    "doc_name": record.metadata.doc_name,
                    "page_number": record.metadata.page_number,
                }],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let response = self
            .client
            .post(self.collection_url("query")?)
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": k,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "chroma".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        let ids = first_list(&payload, "ids");
        let documents = first_list(&payload, "documents");
        let metadatas = first_list(&payload, "metadatas");
        let distances = first_list(&payload, "distances");

        let mut hits = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let metadata = metadatas.get(index);
            hits.push(ScoredChunk {
                id: id.as_str().unwrap_or_default().to_string(),
                text: documents
                    .get(index)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                metadata: ChunkMetadata {
                    doc_name: metadata
                        .and_then(|value| value.pointer("/doc_name"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    page_number: metadata
                        .and_then(|value| value.pointer("/page_number"))
                        .and_then(Value::as_u64)
                        .unwrap_or_default() as u32,
                },
                score: distances
                    .get(index)
                    .and_then(Value::as_f64)
                    .unwrap_or_default(),
            });
        }

        Ok(hits)
    }
}

/// Chroma nests every result field one level deep, one inner list per
/// query embedding; this pipeline always sends exactly one.
fn first_list<'a>(payload: &'a Value, key: &str) -> &'a [Value] {
    payload
        .pointer(&format!("/{key}/0"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
