//! Chunk ingestion: derive ids, embed texts, upsert into the store

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::info;

use crate::chunk::{chunk_id, Chunk};
use crate::embeddings::EmbeddingEngine;
use crate::store::{collection_name, VectorRecord, VectorStore};

/// Records per upsert call (the embedding provider's recommended page size)
const UPSERT_BATCH: usize = 100;

/// Embed chunk texts and upsert them into their (language, exam) collections
///
/// Ids derive from `(source_url, chunk_index)`, so re-ingesting a chunk
/// overwrites its record instead of duplicating it. `origin_ids`, when
/// given, must parallel `chunks` and overrides the provenance id stored in
/// metadata; otherwise the derived id doubles as the origin id.
///
/// Returns the derived ids in input order. An empty input returns an empty
/// list without calling the embedder.
pub fn embed_and_upsert(
    store: &VectorStore,
    embedder: &dyn EmbeddingEngine,
    chunks: &[Chunk],
    origin_ids: Option<&[String]>,
) -> Result<Vec<String>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(ids) = origin_ids {
        anyhow::ensure!(
            ids.len() == chunks.len(),
            "origin_ids length {} does not match {} chunks",
            ids.len(),
            chunks.len()
        );
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts)?;
    anyhow::ensure!(
        embeddings.len() == chunks.len(),
        "embedder returned {} vectors for {} chunks",
        embeddings.len(),
        chunks.len()
    );

    // Chunks may span (language, exam) pairs; group records per collection.
    let mut per_collection: BTreeMap<String, Vec<VectorRecord>> = BTreeMap::new();
    let mut doc_ids = Vec::with_capacity(chunks.len());
    for (i, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
        let id = chunk_id(&chunk.source_url, chunk.chunk_index);
        let origin = match origin_ids {
            Some(ids) => ids[i].clone(),
            None => id.clone(),
        };
        doc_ids.push(id.clone());
        per_collection
            .entry(collection_name(&chunk.language, &chunk.exam))
            .or_default()
            .push(VectorRecord {
                id,
                text: chunk.text.clone(),
                embedding,
                metadata: chunk_metadata(chunk, origin),
            });
    }

    for (collection, records) in &per_collection {
        for batch in records.chunks(UPSERT_BATCH) {
            store.upsert(collection, batch)?;
        }
        info!(
            "upserted {} chunks into collection '{}'",
            records.len(),
            collection
        );
    }

    Ok(doc_ids)
}

fn chunk_metadata(chunk: &Chunk, origin_id: String) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("language".to_string(), chunk.language.clone().into());
    metadata.insert("exam".to_string(), chunk.exam.clone().into());
    metadata.insert("level".to_string(), chunk.level.clone().into());
    metadata.insert(
        "content_type".to_string(),
        chunk.content_type.as_str().into(),
    );
    metadata.insert("source_url".to_string(), chunk.source_url.clone().into());
    metadata.insert(
        "grammar_point".to_string(),
        chunk.grammar_point.clone().unwrap_or_default().into(),
    );
    metadata.insert("char_count".to_string(), (chunk.text.len() as u64).into());
    metadata.insert("origin_id".to_string(), origin_id.into());
    metadata
}
