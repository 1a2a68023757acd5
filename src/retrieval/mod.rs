//! Retrieval: similarity queries plus near-duplicate suppression
//!
//! The [`Retriever`] turns a generation request (language, exam, level,
//! theme) into ranked grammar and vocabulary passage lists. Retrieval is an
//! enhancement, never a precondition: a broken knowledge base degrades to
//! empty results so generation can proceed on the model's general knowledge.

mod dedup;

pub use dedup::{dedup_ranked, JaccardOverlap, TextSimilarity};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::chunk::ContentType;
use crate::config::Settings;
use crate::embeddings::EmbeddingEngine;
use crate::store::{collection_name, MetadataFilter, RetrievalResult, VectorStore};

/// Queries the vector store on behalf of the newsletter generator
///
/// Borrows a caller-owned store and embedder; construct one per request or
/// share one across handlers, both are fine.
pub struct Retriever<'a> {
    store: &'a VectorStore,
    embedder: &'a dyn EmbeddingEngine,
    grammar_n: usize,
    vocab_n: usize,
    dedup_threshold: f32,
    similarity: Box<dyn TextSimilarity>,
}

impl<'a> Retriever<'a> {
    pub fn new(
        store: &'a VectorStore,
        embedder: &'a dyn EmbeddingEngine,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            embedder,
            grammar_n: settings.grammar_retrieval_n,
            vocab_n: settings.vocab_retrieval_n,
            dedup_threshold: settings.dedup_threshold,
            similarity: Box::new(JaccardOverlap),
        }
    }

    /// Swap the near-duplicate measure (default: word-overlap Jaccard)
    pub fn with_similarity(mut self, similarity: Box<dyn TextSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Run separate grammar + vocabulary queries for a theme
    ///
    /// Returns `(grammar_passages, vocab_passages)` as rank-ordered text
    /// lists. Either list is empty when its collection holds no matching
    /// content or when retrieval fails.
    pub fn retrieve(
        &self,
        language: &str,
        exam: &str,
        level: &str,
        theme: &str,
    ) -> (Vec<String>, Vec<String>) {
        let grammar = self.query_collection(
            language,
            exam,
            level,
            theme,
            ContentType::Grammar,
            self.grammar_n,
        );
        let vocab = self.query_collection(
            language,
            exam,
            level,
            theme,
            ContentType::Vocabulary,
            self.vocab_n,
        );
        info!(
            "retrieved {} grammar + {} vocabulary chunks for theme '{}'",
            grammar.len(),
            vocab.len(),
            theme
        );
        (
            grammar.into_iter().map(|r| r.text).collect(),
            vocab.into_iter().map(|r| r.text).collect(),
        )
    }

    /// Origin ids of the passages [`Retriever::retrieve`] would return for
    /// the same inputs, grammar first then vocabulary
    ///
    /// Shares the query path with `retrieve` (including dedup), so the ids
    /// always correspond to the passages actually used for generation.
    /// Records without an origin id are skipped.
    pub fn provenance_ids(
        &self,
        language: &str,
        exam: &str,
        level: &str,
        theme: &str,
    ) -> Vec<String> {
        let grammar = self.query_collection(
            language,
            exam,
            level,
            theme,
            ContentType::Grammar,
            self.grammar_n,
        );
        let vocab = self.query_collection(
            language,
            exam,
            level,
            theme,
            ContentType::Vocabulary,
            self.vocab_n,
        );
        grammar
            .iter()
            .chain(vocab.iter())
            .filter_map(|r| r.metadata.get("origin_id"))
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect()
    }

    /// Query one content type; any failure degrades to an empty list
    fn query_collection(
        &self,
        language: &str,
        exam: &str,
        level: &str,
        theme: &str,
        content_type: ContentType,
        n_results: usize,
    ) -> Vec<RetrievalResult> {
        match self.try_query(language, exam, level, theme, content_type, n_results) {
            Ok(results) => results,
            Err(err) => {
                error!(
                    "retrieval failed for {} {} {} ({}): {:#}",
                    language,
                    exam,
                    level,
                    content_type.as_str(),
                    err
                );
                Vec::new()
            }
        }
    }

    fn try_query(
        &self,
        language: &str,
        exam: &str,
        level: &str,
        theme: &str,
        content_type: ContentType,
        n_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let collection = collection_name(language, exam);
        if self.store.count(&collection)? == 0 {
            warn!("collection '{}' empty for {} {}", collection, language, exam);
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(theme)?;
        let filter = MetadataFilter::new()
            .eq("language", language)
            .eq("exam", exam)
            .eq("level", level)
            .eq("content_type", content_type.as_str());

        let ranked = self
            .store
            .query(&collection, &query_embedding, n_results, &filter)?;
        Ok(dedup_ranked(
            ranked,
            self.dedup_threshold,
            self.similarity.as_ref(),
        ))
    }
}
