//! Sub-scorer contracts consumed by the reward evaluator.
//!
//! Each scorer is a stateless capability. Failures are returned as
//! [`ScorerError`]; the evaluator decides how to degrade.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by sub-scorers.
#[derive(Debug, Error)]
pub enum ScorerError {
    /// The backing service could not be reached
    #[error("scorer unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-success status
    #[error("scorer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be interpreted
    #[error("malformed scorer response: {0}")]
    Malformed(String),

    /// The input cannot be scored (e.g. no words)
    #[error("text cannot be scored: {0}")]
    Unscorable(String),
}

impl From<reqwest::Error> for ScorerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ScorerError::Malformed(err.to_string())
        } else {
            ScorerError::Unavailable(err.to_string())
        }
    }
}

/// Semantic similarity between two texts, cosine convention in `[-1, 1]`.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn similarity(&self, text: &str, reference: &str) -> Result<f64, ScorerError>;
}

/// Reading-ease score of a text; higher is easier to read.
#[async_trait]
pub trait ReadabilityScorer: Send + Sync {
    async fn readability(&self, text: &str) -> Result<f64, ScorerError>;
}

/// Count of grammar and style issues in a text.
#[async_trait]
pub trait GrammarChecker: Send + Sync {
    async fn check(&self, text: &str) -> Result<u32, ScorerError>;
}
