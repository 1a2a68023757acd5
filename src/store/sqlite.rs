//! SQLite-backed vector store with brute-force cosine search
//!
//! Embeddings are stored as little-endian f32 blobs next to their document
//! text and metadata JSON; similarity is computed in Rust over a full
//! collection scan, giving exact ranking at the data volumes involved
//! (thousands of chunks per collection).

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{MetadataFilter, RetrievalResult, VectorRecord};
use crate::embeddings::normalize;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS collections (
    name      TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS vector_store (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    document   TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    metadata   TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
";

/// Store of embedding records keyed by (collection, id)
///
/// One handle is constructed at process start and shared by reference; the
/// connection is mutex-guarded, so concurrent request handlers never observe
/// a partially-written record.
pub struct VectorStore {
    conn: Mutex<Connection>,
}

impl VectorStore {
    /// Open or create the store database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open vector store database")?;
        Self::init(conn)
    }

    /// Create an in-memory store for testing
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to apply vector store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or overwrite records under (collection, id)
    ///
    /// Records are written independently: a rejected record does not prevent
    /// the others from committing. The first write to a collection fixes its
    /// embedding dimension; later records of a different width are rejected.
    /// Errors after attempting every record if any were rejected, naming the
    /// count.
    pub fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock();

        let dimension = match Self::collection_dimension(&conn, collection)? {
            Some(dimension) => dimension,
            None => {
                let dimension = records[0].embedding.len();
                conn.execute(
                    "INSERT INTO collections (name, dimension) VALUES (?, ?)
                     ON CONFLICT(name) DO NOTHING",
                    params![collection, dimension as i64],
                )
                .context("Failed to register collection")?;
                dimension
            }
        };

        let mut rejected = 0usize;
        for record in records {
            if record.embedding.len() != dimension {
                warn!(
                    "rejecting record '{}': embedding width {} differs from collection '{}' dimension {}",
                    record.id,
                    record.embedding.len(),
                    collection,
                    dimension
                );
                rejected += 1;
                continue;
            }
            let blob = embedding_to_bytes(&record.embedding);
            let metadata = Value::Object(record.metadata.clone()).to_string();
            let written = conn.execute(
                "INSERT INTO vector_store (collection, id, document, embedding, metadata)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET
                   document = excluded.document,
                   embedding = excluded.embedding,
                   metadata = excluded.metadata",
                params![collection, record.id, record.text, blob, metadata],
            );
            if let Err(err) = written {
                warn!("failed to upsert record '{}': {}", record.id, err);
                rejected += 1;
            }
        }

        debug!(
            "upserted {} vectors into '{}'",
            records.len() - rejected,
            collection
        );
        if rejected > 0 {
            anyhow::bail!(
                "rejected {} of {} records for collection '{}'",
                rejected,
                records.len(),
                collection
            );
        }
        Ok(())
    }

    /// Number of live records in the collection; 0 when never written
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vector_store WHERE collection = ?",
                [collection],
                |row| row.get(0),
            )
            .context("Failed to count collection records")?;
        Ok(count as usize)
    }

    /// Exact nearest-neighbor search with metadata filtering
    ///
    /// Scans every record of the collection in insertion order, keeps those
    /// matching the filter, ranks by cosine distance (ascending, stable sort
    /// so ties keep insertion order), and truncates to `n_results`. An
    /// unknown collection yields an empty list, never an error. A stored
    /// vector whose width differs from the query (including the degenerate
    /// empty vector) gets maximal distance instead of crashing the scan.
    pub fn query(
        &self,
        collection: &str,
        query_embedding: &[f32],
        n_results: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievalResult>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, document, embedding, metadata FROM vector_store
                     WHERE collection = ? ORDER BY rowid",
                )
                .context("Failed to prepare collection scan")?;
            let mapped = stmt.query_map([collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            mapped
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to scan collection")?
        };

        let query_unit = normalize(query_embedding);
        let mut results = Vec::new();
        for (id, document, blob, metadata_json) in rows {
            let metadata: Map<String, Value> =
                serde_json::from_str(&metadata_json).unwrap_or_default();
            if !filter.matches(&metadata) {
                continue;
            }
            let embedding = bytes_to_embedding(&blob);
            let distance = if embedding.is_empty() || embedding.len() != query_unit.len() {
                2.0
            } else {
                let record_unit = normalize(&embedding);
                1.0 - dot(&query_unit, &record_unit)
            };
            results.push(RetrievalResult {
                id,
                text: document,
                metadata,
                distance,
            });
        }

        results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        results.truncate(n_results);
        Ok(results)
    }

    /// Names of all collections that have at least one record
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT DISTINCT collection FROM vector_store ORDER BY collection")
            .context("Failed to prepare collection listing")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list collections")
    }

    fn collection_dimension(conn: &Connection, collection: &str) -> Result<Option<usize>> {
        let dimension: Option<i64> = conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?",
                [collection],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read collection dimension")?;
        Ok(dimension.map(|d| d as usize))
    }
}

/// f32 slice to little-endian bytes for the SQLite blob
fn embedding_to_bytes(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|&f| f.to_le_bytes()).collect()
}

/// Inverse of `embedding_to_bytes`; trailing partial floats are dropped
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
