mod server;

use clap::{Parser, Subcommand, ValueEnum};
use pdf_rag_core::{
    AnswerGenerator, CharacterNgramEmbedder, ChromaStore, Embedder, IngestionOptions,
    IngestionOutcome, IngestionPipeline, LopdfExtractor, MemoryStore, OllamaEmbedder,
    OllamaGenerator, RetrievalService, VectorStore, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GENERATION_MODEL, DEFAULT_TOP_K,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Embedding model served by Ollama
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Generation model served by Ollama
    #[arg(long, env = "GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    generation_model: String,

    /// Embedding backend
    #[arg(long, value_enum, default_value = "ollama")]
    embedder: EmbedderBackend,

    /// Vector store backend
    #[arg(long, value_enum, default_value = "local")]
    store: StoreBackend,

    /// Data directory for the local store
    #[arg(long, env = "VECTOR_STORE_DIR", default_value = "./data/vector_store")]
    data_dir: PathBuf,

    /// Chroma base URL
    #[arg(long, env = "CHROMA_URL", default_value = "http://localhost:8000")]
    chroma_url: String,

    /// Chroma collection name
    #[arg(long, default_value = "pdf_chunks")]
    chroma_collection: String,

    /// Chunk window size in characters
    #[arg(long, default_value_t = 3000)]
    chunk_size: usize,

    /// Overlap between consecutive windows in characters
    #[arg(long, default_value_t = 500)]
    overlap: usize,

    /// Timeout for model and store calls, in seconds
    #[arg(long, default_value_t = 120)]
    request_timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreBackend {
    /// In-process store snapshotted under --data-dir
    Local,
    /// Chroma server over HTTP
    Chroma,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderBackend {
    /// Ollama embeddings endpoint
    Ollama,
    /// Deterministic local hashing embedder, no model server needed
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a folder of PDFs into the vector store. Runs once: a store
    /// that already holds chunks is left untouched.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long, default_value = "./resource")]
        resource: PathBuf,
    },
    /// Retrieve the top-k chunks for a query and generate an answer.
    Query {
        /// Question to answer
        #[arg(long)]
        text: String,
        /// Number of context chunks to retrieve.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Ingest if the store is empty, then serve the query endpoint.
    Serve {
        /// Folder that contains PDFs recursively.
        #[arg(long, default_value = "./resource")]
        resource: PathBuf,
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// Number of context chunks per query.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

impl Cli {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn build_embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderBackend::Ollama => Arc::new(OllamaEmbedder::new(
                &self.ollama_url,
                &self.embedding_model,
                self.timeout(),
            )?),
            EmbedderBackend::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        })
    }

    async fn build_store(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        Ok(match self.store {
            StoreBackend::Local => Arc::new(MemoryStore::open(&self.data_dir)?),
            StoreBackend::Chroma => Arc::new(
                ChromaStore::connect(&self.chroma_url, &self.chroma_collection, self.timeout())
                    .await?,
            ),
        })
    }

    fn build_generator(&self) -> anyhow::Result<Arc<dyn AnswerGenerator>> {
        Ok(Arc::new(OllamaGenerator::new(
            &self.ollama_url,
            &self.generation_model,
            self.timeout(),
        )?))
    }

    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

async fn ingest(
    cli: &Cli,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    resource: &PathBuf,
) -> anyhow::Result<()> {
    let pipeline =
        IngestionPipeline::new(LopdfExtractor, embedder, store, &cli.ingestion_options())?;

    match pipeline.run(resource).await? {
        IngestionOutcome::AlreadyPopulated { existing } => {
            println!("store already holds {existing} chunks, ingestion skipped");
        }
        IngestionOutcome::Completed(report) => {
            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }
            for skipped in &report.skipped_pages {
                warn!(
                    doc = %skipped.doc_name,
                    page = skipped.page_number,
                    reason = %skipped.reason,
                    "skipped page"
                );
            }
            for skipped in &report.skipped_chunks {
                warn!(chunk = %skipped.chunk_id, reason = %skipped.reason, "skipped chunk");
            }
            println!(
                "{} chunks from {} documents ingested at {}",
                report.chunks_inserted,
                report.documents.len(),
                report.finished_at.to_rfc3339()
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let embedder = cli.build_embedder()?;
    let store = cli.build_store().await?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %chrono::Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    match &cli.command {
        Command::Ingest { resource } => {
            ingest(&cli, embedder, store, resource).await?;
        }
        Command::Query { text, top_k } => {
            let retrieval = RetrievalService::new(embedder, store);
            let hits = retrieval.retrieve(text, *top_k).await?;

            for hit in &hits {
                println!(
                    "[score {:.4}] {} page {}",
                    hit.score, hit.metadata.doc_name, hit.metadata.page_number
                );
                println!("  {}", hit.text);
            }

            let generator = cli.build_generator()?;
            let answer = generator.generate(text, &hits).await?;
            println!("answer: {answer}");
        }
        Command::Serve {
            resource,
            addr,
            top_k,
        } => {
            ingest(&cli, embedder.clone(), store.clone(), resource).await?;

            let state = Arc::new(server::AppState {
                retrieval: RetrievalService::new(embedder, store),
                generator: cli.build_generator()?,
                top_k: *top_k,
            });

            server::serve(*addr, state).await?;
        }
    }

    Ok(())
}
