//! Integration tests for the retriever: filtering, dedup, degradation

use std::collections::HashMap;

use anyhow::Result;
use glossa::{embed_and_upsert, Chunk, ContentType, EmbeddingEngine, Retriever, Settings, VectorStore};

/// Deterministic embedder: fixed vector per known text, error otherwise
struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl StubEmbedder {
    fn new(pairs: &[(&str, [f32; 3])]) -> Self {
        Self {
            vectors: pairs
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
        }
    }
}

impl EmbeddingEngine for StubEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no stub vector for '{}'", text))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "stub-embedder"
    }
}

/// Embedder that always fails, for the degradation path
struct FailingEmbedder;

impl EmbeddingEngine for FailingEmbedder {
    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding provider unavailable")
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "failing-embedder"
    }
}

fn chunk(content_type: ContentType, level: &str, url: &str, index: usize, text: &str) -> Chunk {
    Chunk {
        language: "Spanish".to_string(),
        exam: "DELE".to_string(),
        level: level.to_string(),
        content_type,
        source_url: url.to_string(),
        chunk_index: index,
        text: text.to_string(),
        grammar_point: None,
    }
}

#[test]
fn test_empty_collection_retrieves_nothing() {
    let store = VectorStore::open_in_memory().unwrap();
    let embedder = StubEmbedder::new(&[]);
    let settings = Settings::default();
    let retriever = Retriever::new(&store, &embedder, &settings);

    let (grammar, vocab) = retriever.retrieve("Spanish", "DELE", "B1", "ordering coffee");
    assert!(grammar.is_empty());
    assert!(vocab.is_empty());
}

#[test]
fn test_near_duplicate_passages_collapse_to_one() -> Result<()> {
    let store = VectorStore::open_in_memory()?;
    let first = "Use *ser* for permanent traits.";
    let second = "Use *ser* for permanent traits and identity.";
    let embedder = StubEmbedder::new(&[
        (first, [0.0, 1.0, 0.0]),
        (second, [0.0, 0.0, 1.0]),
        ("weather small talk", [1.0, 0.0, 0.0]),
    ]);

    embed_and_upsert(
        &store,
        &embedder,
        &[
            chunk(ContentType::Grammar, "B1", "https://example.com/ser", 0, first),
            chunk(ContentType::Grammar, "B1", "https://example.com/ser", 1, second),
        ],
        None,
    )?;

    let settings = Settings::default();
    let retriever = Retriever::new(&store, &embedder, &settings);
    // Theme unrelated to either passage; filter matches both; the pair's
    // word overlap makes them near-duplicates, so one survives.
    let (grammar, _) = retriever.retrieve("Spanish", "DELE", "B1", "weather small talk");
    assert_eq!(grammar, vec![first.to_string()]);
    Ok(())
}

#[test]
fn test_vocab_results_truncated_and_ordered() -> Result<()> {
    let store = VectorStore::open_in_memory()?;
    // Word sets are fully disjoint so dedup keeps every passage
    let texts = [
        "cafe cortado bombon",
        "cuenta propina camarero",
        "desayuno tostada zumo",
        "merienda churros chocolate",
        "sobremesa tertulia charla",
    ];
    // Increasing angle from the theme vector: rank follows ingestion index
    let mut pairs: Vec<(&str, [f32; 3])> = vec![("ordering coffee", [1.0, 0.0, 0.0])];
    let angles = [0.0, 0.2, 0.4, 0.6, 0.8];
    for (text, angle) in texts.iter().zip(angles) {
        pairs.push((*text, [1.0, angle, 0.0]));
    }
    let embedder = StubEmbedder::new(&pairs);

    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            chunk(ContentType::Vocabulary, "B1", "https://example.com/vocab", i, text)
        })
        .collect();
    embed_and_upsert(&store, &embedder, &chunks, None)?;

    let settings = Settings {
        vocab_retrieval_n: 4,
        ..Settings::default()
    };
    let retriever = Retriever::new(&store, &embedder, &settings);
    let (_, vocab) = retriever.retrieve("Spanish", "DELE", "B1", "ordering coffee");
    assert_eq!(vocab.len(), 4);
    assert_eq!(vocab, texts[..4].to_vec());
    Ok(())
}

#[test]
fn test_level_filter_excludes_other_levels() -> Result<()> {
    let store = VectorStore::open_in_memory()?;
    let b1_text = "Preterite endings for -ar verbs.";
    let b2_text = "Pluperfect subjunctive in conditional clauses.";
    let embedder = StubEmbedder::new(&[
        (b1_text, [0.0, 1.0, 0.0]),
        // Closer to the theme, but the wrong level
        (b2_text, [1.0, 0.0, 0.0]),
        ("past tense practice", [1.0, 0.0, 0.0]),
    ]);

    embed_and_upsert(
        &store,
        &embedder,
        &[
            chunk(ContentType::Grammar, "B1", "https://example.com/b1", 0, b1_text),
            chunk(ContentType::Grammar, "B2", "https://example.com/b2", 0, b2_text),
        ],
        None,
    )?;

    let settings = Settings::default();
    let retriever = Retriever::new(&store, &embedder, &settings);
    let (grammar, _) = retriever.retrieve("Spanish", "DELE", "B1", "past tense practice");
    assert_eq!(grammar, vec![b1_text.to_string()]);
    Ok(())
}

#[test]
fn test_reingest_overwrites_instead_of_duplicating() -> Result<()> {
    let store = VectorStore::open_in_memory()?;
    let old_text = "Use estar for locations.";
    let new_text = "Use estar for locations and temporary states.";
    let embedder = StubEmbedder::new(&[
        (old_text, [0.0, 1.0, 0.0]),
        (new_text, [0.0, 1.0, 0.0]),
        ("directions", [0.0, 1.0, 0.0]),
    ]);

    let url = "https://example.com/estar";
    embed_and_upsert(
        &store,
        &embedder,
        &[chunk(ContentType::Grammar, "B1", url, 0, old_text)],
        None,
    )?;
    let ids_second = embed_and_upsert(
        &store,
        &embedder,
        &[chunk(ContentType::Grammar, "B1", url, 0, new_text)],
        None,
    )?;

    assert_eq!(store.count("lang_spanish_dele")?, 1);
    assert_eq!(ids_second.len(), 1);

    let settings = Settings::default();
    let retriever = Retriever::new(&store, &embedder, &settings);
    let (grammar, _) = retriever.retrieve("Spanish", "DELE", "B1", "directions");
    assert_eq!(grammar, vec![new_text.to_string()]);
    Ok(())
}

#[test]
fn test_provenance_ids_match_surviving_passages() -> Result<()> {
    let store = VectorStore::open_in_memory()?;
    let grammar_text = "Use ser for permanent traits.";
    let vocab_text = "Vocabulary: cafe leche azucar";
    let embedder = StubEmbedder::new(&[
        (grammar_text, [0.0, 1.0, 0.0]),
        (vocab_text, [0.0, 0.0, 1.0]),
        ("ordering coffee", [1.0, 0.0, 0.0]),
    ]);

    embed_and_upsert(
        &store,
        &embedder,
        &[
            chunk(ContentType::Grammar, "B1", "https://example.com/g", 0, grammar_text),
            chunk(ContentType::Vocabulary, "B1", "https://example.com/v", 0, vocab_text),
        ],
        Some(&["101".to_string(), "202".to_string()]),
    )?;

    let settings = Settings::default();
    let retriever = Retriever::new(&store, &embedder, &settings);

    let (grammar, vocab) = retriever.retrieve("Spanish", "DELE", "B1", "ordering coffee");
    assert_eq!(grammar.len(), 1);
    assert_eq!(vocab.len(), 1);

    // Grammar ids come first, then vocabulary
    let ids = retriever.provenance_ids("Spanish", "DELE", "B1", "ordering coffee");
    assert_eq!(ids, vec!["101".to_string(), "202".to_string()]);
    Ok(())
}

#[test]
fn test_default_provenance_ids_are_derived_chunk_ids() -> Result<()> {
    let store = VectorStore::open_in_memory()?;
    let text = "Use ser for permanent traits.";
    let embedder = StubEmbedder::new(&[
        (text, [0.0, 1.0, 0.0]),
        ("identity", [0.0, 1.0, 0.0]),
    ]);

    let derived = embed_and_upsert(
        &store,
        &embedder,
        &[chunk(ContentType::Grammar, "B1", "https://example.com/g", 0, text)],
        None,
    )?;

    let settings = Settings::default();
    let retriever = Retriever::new(&store, &embedder, &settings);
    let ids = retriever.provenance_ids("Spanish", "DELE", "B1", "identity");
    assert_eq!(ids, derived);
    Ok(())
}

#[test]
fn test_custom_similarity_replaces_word_overlap() -> Result<()> {
    // A measure that treats every pair as identical: only the top-ranked
    // passage of each content type can survive dedup.
    struct AlwaysDuplicate;

    impl glossa::retrieval::TextSimilarity for AlwaysDuplicate {
        fn similarity(&self, _a: &str, _b: &str) -> f32 {
            1.0
        }
    }

    let store = VectorStore::open_in_memory()?;
    let near = "cafe cortado bombon";
    let far = "cuenta propina camarero";
    let embedder = StubEmbedder::new(&[
        (near, [1.0, 0.0, 0.0]),
        (far, [0.0, 1.0, 0.0]),
        ("ordering coffee", [1.0, 0.0, 0.0]),
    ]);
    embed_and_upsert(
        &store,
        &embedder,
        &[
            chunk(ContentType::Vocabulary, "B1", "https://example.com/v", 0, near),
            chunk(ContentType::Vocabulary, "B1", "https://example.com/v", 1, far),
        ],
        None,
    )?;

    let settings = Settings::default();
    let retriever =
        Retriever::new(&store, &embedder, &settings).with_similarity(Box::new(AlwaysDuplicate));
    let (_, vocab) = retriever.retrieve("Spanish", "DELE", "B1", "ordering coffee");
    assert_eq!(vocab, vec![near.to_string()]);
    Ok(())
}

#[test]
fn test_embedder_failure_degrades_to_empty_results() -> Result<()> {
    let store = VectorStore::open_in_memory()?;
    let text = "Use ser for permanent traits.";
    let stub = StubEmbedder::new(&[(text, [0.0, 1.0, 0.0])]);
    embed_and_upsert(
        &store,
        &stub,
        &[chunk(ContentType::Grammar, "B1", "https://example.com/g", 0, text)],
        None,
    )?;

    // Collection is populated, but the embedder is down: retrieval must
    // degrade to empty lists rather than error.
    let settings = Settings::default();
    let retriever = Retriever::new(&store, &FailingEmbedder, &settings);
    let (grammar, vocab) = retriever.retrieve("Spanish", "DELE", "B1", "ordering coffee");
    assert!(grammar.is_empty());
    assert!(vocab.is_empty());
    assert!(retriever
        .provenance_ids("Spanish", "DELE", "B1", "ordering coffee")
        .is_empty());
    Ok(())
}
