//! Embedding-based similarity through an Ollama-compatible embeddings API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::scorers::{ScorerError, SimilarityScorer};

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

/// Last reference text and its embedding.
type ReferenceCache = Arc<Mutex<Option<(String, Arc<Vec<f64>>)>>>;

/// Cosine similarity of embeddings fetched from `{base_url}/api/embeddings`.
///
/// The reference stays fixed for a whole run, so its embedding is fetched
/// once and reused until a different reference is passed in.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingSimilarity {
    client: reqwest::Client,
    base_url: String,
    model: String,
    reference: ReferenceCache,
}

impl OllamaEmbeddingSimilarity {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ScorerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScorerError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            reference: Arc::default(),
        })
    }

    async fn reference_embedding(&self, reference: &str) -> Result<Arc<Vec<f64>>, ScorerError> {
        let cached = {
            let guard = self.reference.lock().unwrap();
            guard
                .as_ref()
                .filter(|(text, _)| text == reference)
                .map(|(_, embedding)| Arc::clone(embedding))
        };
        if let Some(embedding) = cached {
            return Ok(embedding);
        }
        let embedding = Arc::new(self.embed(reference).await?);
        *self.reference.lock().unwrap() = Some((reference.to_string(), Arc::clone(&embedding)));
        Ok(embedding)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>, ScorerError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScorerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ScorerError::Malformed(e.to_string()))?;
        if parsed.embedding.is_empty() {
            return Err(ScorerError::Malformed("empty embedding".to_string()));
        }
        debug!(dims = parsed.embedding.len(), "embedding fetched");
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl SimilarityScorer for OllamaEmbeddingSimilarity {
    async fn similarity(&self, text: &str, reference: &str) -> Result<f64, ScorerError> {
        let a = self.reference_embedding(reference).await?;
        let b = self.embed(text).await?;
        cosine_similarity(&a, &b)
    }
}

/// Cosine similarity of two equally sized vectors.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, ScorerError> {
    if a.len() != b.len() {
        return Err(ScorerError::Malformed(format!(
            "embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(ScorerError::Unscorable("zero-length embedding".to_string()));
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
