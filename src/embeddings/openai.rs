//! OpenAI batch embedding client
//!
//! Blocking client for the `/v1/embeddings` endpoint. Inputs are split into
//! fixed-size batches and each response is checked against the hard
//! invariant: one output vector per input text, in input order, at the
//! configured dimension. Transient failures propagate to the caller, which
//! owns any retry policy.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingEngine;
use crate::config::Settings;

const EMBEDDINGS_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Blocking embeddings client for OpenAI-compatible endpoints
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Build a client from settings; fails fast when the API key is missing
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_endpoint(settings, EMBEDDINGS_ENDPOINT)
    }

    /// Build a client against a custom endpoint (compatible self-hosted
    /// servers, tests)
    pub fn with_endpoint(settings: &Settings, endpoint: &str) -> Result<Self> {
        anyhow::ensure!(
            !settings.openai_api_key.trim().is_empty(),
            "OPENAI_API_KEY not set"
        );
        anyhow::ensure!(
            !settings.embedding_model.trim().is_empty(),
            "embedding model name is empty"
        );

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", settings.openai_api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("API key is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .context("Failed to build embeddings HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: settings.embedding_model.clone(),
            dimension: settings.embedding_dimension,
            batch_size: settings.embedding_batch_size.max(1),
        })
    }

    /// One POST to the embeddings endpoint for a single batch
    fn request_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: batch,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .with_context(|| format!("Failed to POST {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("embeddings request failed ({}): {}", status, body);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .context("Failed to parse embeddings response")?;
        parsed.data.sort_by_key(|row| row.index);

        anyhow::ensure!(
            parsed.data.len() == batch.len(),
            "provider returned {} embeddings for {} inputs",
            parsed.data.len(),
            batch.len()
        );
        for row in &parsed.data {
            anyhow::ensure!(
                row.embedding.len() == self.dimension,
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                row.embedding.len()
            );
        }

        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }
}

impl EmbeddingEngine for OpenAiEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.request_batch(batch)?;
            debug!("embedded batch of {} texts", batch.len());
            all_embeddings.extend(vectors);
        }
        Ok(all_embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
    index: usize,
}
