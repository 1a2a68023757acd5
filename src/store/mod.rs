//! Persisted similarity index over text embeddings
//!
//! A named-collection vector store backed by SQLite. Records are
//! `(collection, id, document, embedding, metadata)` rows keyed by
//! `(collection, id)`; search is an exact brute-force cosine scan. The scan
//! lives behind [`VectorStore::query`] so an indexed nearest-neighbor
//! structure can replace it later without touching callers.

mod sqlite;

pub use sqlite::VectorStore;

use serde_json::{Map, Value};

/// One record to upsert into a collection
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// One ranked hit from [`VectorStore::query`]
///
/// Transient, produced per query. Distance is cosine distance in `[0, 2]`,
/// smaller = more similar.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub distance: f32,
}

/// Conjunction of exact-match metadata clauses
///
/// AND semantics only: a record matches when every clause equals the
/// corresponding metadata value exactly (string/number equality). An empty
/// filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    clauses: Vec<(String, Value)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality clause
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| metadata.get(field) == Some(value))
    }
}

/// Collection naming: one collection per (language, exam) pair
///
/// Lower-cased with spaces and slashes normalized to underscores, e.g.
/// `("Spanish", "DELE")` → `"lang_spanish_dele"`.
pub fn collection_name(language: &str, exam: &str) -> String {
    let slug = format!("{}_{}", language, exam)
        .to_lowercase()
        .replace([' ', '/'], "_");
    format!("lang_{}", slug)
}
