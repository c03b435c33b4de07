//! Embedding provider boundary and vector similarity
//!
//! Memories are embedded once when stored and the working summary is embedded
//! once per cycle to query them. The provider must return vectors of a fixed
//! dimensionality; a vector of any other length is a malformed response.

use crate::error::{KairosError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Embedding dimension of `text-embedding-3-small`
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Configuration for the embedding provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub dimensions: usize,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: DEFAULT_EMBEDDING_DIM,
            request_timeout_secs: 30,
        }
    }
}

/// Embedding provider trait
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality every returned vector has
    fn dimensions(&self) -> usize;
}

/// OpenAI-compatible `/embeddings` client
pub struct RemoteEmbeddingService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl RemoteEmbeddingService {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(KairosError::Config(format!(
                "{} not set",
                config.api_key_env
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding {} chars with {}", text.len(), self.model);

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: text,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KairosError::Transport(format!(
                "embeddings returned status {}",
                status
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KairosError::MalformedResponse(e.to_string()))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| KairosError::MalformedResponse("no embedding returned".to_string()))?
            .embedding;

        if embedding.len() != self.dimensions {
            return Err(KairosError::MalformedResponse(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                embedding.len()
            )));
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Cosine similarity between two vectors of equal length.
///
/// A zero-norm vector on either side, or any non-finite intermediate, yields
/// 0.0 so a corrupt embedding ranks last instead of poisoning the sort.
/// Callers must check lengths first; mismatched lengths also yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (magnitude_a * magnitude_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}
