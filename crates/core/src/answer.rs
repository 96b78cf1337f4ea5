use crate::error::GenerateError;
use crate::models::ScoredChunk;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GENERATION_MODEL: &str = "llama3";

/// Turns a query plus retrieved context into a natural-language answer.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        context: &[ScoredChunk],
    ) -> Result<String, GenerateError>;
}

#[async_trait]
impl<G: AnswerGenerator + ?Sized> AnswerGenerator for Arc<G> {
    async fn generate(
        &self,
        query: &str,
        context: &[ScoredChunk],
    ) -> Result<String, GenerateError> {
        (**self).generate(query, context).await
    }
}

/// Generator backed by an Ollama server's `/api/generate` endpoint,
/// non-streaming.
pub struct OllamaGenerator {
    endpoint: Url,
    model: String,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerateError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            model: model.into(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

pub fn build_prompt(query: &str, context: &[ScoredChunk]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the context below. \
         If the context does not contain the answer, say so.\n\nContext:\n",
    );

    for chunk in context {
        prompt.push_str("- ");
        prompt.push_str(&chunk.text);
        prompt.push('\n');
    }

    prompt.push_str("\nQuestion: ");
    prompt.push_str(query);
    prompt.push_str("\nAnswer:");
    prompt
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    async fn generate(
        &self,
        query: &str,
        context: &[ScoredChunk],
    ) -> Result<String, GenerateError> {
        let url = self.endpoint.join("api/generate")?;
        let prompt = build_prompt(query, context);

        let response = self
            .client
            .post(url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &prompt,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerateError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: GenerateResponse = response.json().await?;
        Ok(payload.response)
    }
}
