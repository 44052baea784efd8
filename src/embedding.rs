//! Embedding boundary and vector math.
//!
//! [`Embedder`] is the seam between the knowledge index and the embedding
//! service; [`OpenAiEmbedder`] is the production implementation, calling the
//! OpenAI embeddings API with batching and retry. Tests substitute
//! deterministic fakes through the same trait.
//!
//! # Retry Strategy
//!
//! Transient errors back off exponentially:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! # Similarity Metric
//!
//! Search scores are **cosine similarity**: monotonic, higher = more
//! similar, in `[-1.0, 1.0]`. See [`cosine_similarity`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::KbError;

/// An embedding backend: turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError>;
}

/// Embedding backend using the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, KbError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| KbError::Embedding("OPENAI_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embeddings_response(&json);
                    }

                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(KbError::Embedding(format!(
                            "API error {}: {}",
                            status, text
                        )));
                        continue;
                    }

                    // Other client errors are not retryable
                    return Err(KbError::Embedding(format!("API error {}: {}", status, text)));
                }
                Err(e) => {
                    last_err = Some(KbError::Embedding(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| KbError::Embedding("retries exhausted".into())))
    }
}

/// Pull the `data[].embedding` arrays out of an embeddings API response,
/// preserving input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, KbError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| KbError::Embedding("response missing data array".into()))?;

    let mut vectors = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| KbError::Embedding("response item missing embedding".into()))?;

        vectors.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }

    Ok(vectors)
}

/// Encode a vector as little-endian `f32` bytes (4 bytes per component).
pub fn vec_to_bytes(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes back into a vector. Trailing bytes that
/// do not fill a component are ignored.
pub fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity between two vectors: `1.0` same direction, `0.0`
/// orthogonal, `-1.0` opposite. Returns `0.0` for empty or mismatched
/// inputs rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
