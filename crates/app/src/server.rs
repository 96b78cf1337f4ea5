use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use pdf_rag_core::{AnswerGenerator, Embedder, RetrievalService, ScoredChunk, VectorStore};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

pub struct AppState {
    pub retrieval: RetrievalService<Arc<dyn Embedder>, Arc<dyn VectorStore>>,
    pub generator: Arc<dyn AnswerGenerator>,
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
}

#[derive(Debug, Serialize)]
pub struct SourceMetadata {
    pub doc_name: String,
    pub page: u32,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub metadata: Vec<SourceMetadata>,
    /// One inner list of chunk texts, mirroring the store's
    /// list-per-query-embedding response shape that clients already parse.
    pub paragraph: Vec<Vec<String>>,
}

pub fn query_response(answer: String, hits: &[ScoredChunk]) -> QueryResponse {
    QueryResponse {
        answer,
        metadata: hits
            .iter()
            .map(|hit| SourceMetadata {
                doc_name: hit.metadata.doc_name.clone(),
                page: hit.metadata.page_number,
            })
            .collect(),
        paragraph: vec![hits.iter().map(|hit| hit.text.clone()).collect()],
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/query", post(handle_query))
        .with_state(state)
}

async fn handle_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let hits = state
        .retrieval
        .retrieve(&request.query_text, state.top_k)
        .await
        .map_err(internal_error)?;

    let answer = state
        .generator
        .generate(&request.query_text, &hits)
        .await
        .map_err(internal_error)?;

    Ok(Json(query_response(answer, &hits)))
}

fn internal_error(error: impl Display) -> (StatusCode, String) {
    error!(%error, "query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("An error occurred: {error}"),
    )
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving queries");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
