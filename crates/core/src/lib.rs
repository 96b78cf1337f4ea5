pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod stores;
pub mod traits;

pub use answer::{build_prompt, AnswerGenerator, OllamaGenerator, DEFAULT_GENERATION_MODEL};
pub use chunking::{
    chunk_id, chunk_windows, normalize_page_text, ChunkWindow, ChunkWindows, ChunkingConfig,
};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_NGRAM_DIMENSIONS,
};
pub use error::{EmbedError, GenerateError, IngestError, RetrieveError, StoreError};
pub use extractor::{ExtractedPages, FailedPage, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{
    digest_file, discover_pdf_files, IngestionOutcome, IngestionPipeline, IngestionReport,
    SkippedChunk, SkippedFile, SkippedPage,
};
pub use models::{
    ChunkMetadata, ChunkRecord, DocumentFingerprint, IngestionOptions, ScoredChunk,
};
pub use retrieval::{RetrievalService, DEFAULT_TOP_K};
pub use stores::{ChromaStore, MemoryStore};
pub use traits::VectorStore;
