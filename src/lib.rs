//! Embedding store and retrieval pipeline for language-exam curriculum
//! content: chunks scraped from exam syllabi are embedded, persisted in a
//! SQLite-backed similarity index, and retrieved (with near-duplicate
//! suppression) to ground newsletter generation.

pub mod chunk;
pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod retrieval;
pub mod store;

// Re-export commonly used types
pub use chunk::{chunk_id, Chunk, ContentType};
pub use config::Settings;
pub use embeddings::{EmbeddingEngine, OpenAiEmbedder};
pub use ingest::embed_and_upsert;
pub use retrieval::Retriever;
pub use store::{collection_name, MetadataFilter, RetrievalResult, VectorRecord, VectorStore};
