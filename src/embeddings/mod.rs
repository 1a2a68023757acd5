//! Embeddings module - turn curriculum text into vectors
//!
//! Trait-based abstraction over embedding providers with an OpenAI HTTP
//! backend. The trait is the seam tests and future local backends plug into.

mod openai;
mod similarity;

pub use openai::OpenAiEmbedder;
pub use similarity::{cosine_similarity, normalize};

use anyhow::Result;

/// Trait for embedding generation engines
///
/// `Send + Sync` so one client can be shared across concurrent request
/// handlers.
pub trait EmbeddingEngine: Send + Sync {
    /// Generate embeddings for multiple texts
    ///
    /// Returns one vector per input text, in input order. Implementations
    /// must fail rather than return a shorter or reordered batch.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for input text"))
    }

    /// Embedding dimension (e.g. 1536 for text-embedding-3-small)
    fn dimension(&self) -> usize;

    /// Model identifier
    fn model_name(&self) -> &str;
}
