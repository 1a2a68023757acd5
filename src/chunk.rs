//! Curriculum chunk types and content-addressed identity

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Whether a chunk carries grammar or vocabulary content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Grammar,
    Vocabulary,
}

impl ContentType {
    /// Stable lowercase form used in metadata and filters
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Grammar => "grammar",
            ContentType::Vocabulary => "vocabulary",
        }
    }
}

/// A unit of scraped curriculum text with provenance metadata
///
/// Produced by the (external) exam scrapers and consumed by
/// [`crate::ingest::embed_and_upsert`]. Identity derives from
/// `(source_url, chunk_index)` via [`chunk_id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub language: String,
    pub exam: String,
    pub level: String,
    pub content_type: ContentType,
    pub source_url: String,
    pub chunk_index: usize,
    pub text: String,
    /// Grammar entry heading, when the source page exposes one
    pub grammar_point: Option<String>,
}

/// Deterministic chunk ID: sha256(url + index)[..16]
///
/// Identical inputs always produce the identical id, so re-ingesting a chunk
/// overwrites its stored record instead of duplicating it.
pub fn chunk_id(source_url: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_url.as_bytes());
    hasher.update(chunk_index.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
    hex[..16].to_string()
}
