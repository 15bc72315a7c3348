//! Rewriting oracle: produces one candidate rewrite of a draft per call.
//!
//! The default implementation talks to an Ollama-compatible
//! `/api/generate` endpoint with streaming disabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default generation model
pub const DEFAULT_MODEL: &str = "mistral";

/// Default prompt; `{text}` is replaced with the draft.
pub const DEFAULT_PROMPT: &str =
    "Rephrase this text improving grammar, clarity, and readability:\n\n{text}\n\nRephrased:";

/// Default bound on a single rewrite request.
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from a rewrite request.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle unreachable: {0}")]
    Unavailable(String),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed oracle response: {0}")]
    Malformed(String),

    #[error("oracle returned an empty rewrite")]
    EmptyResponse,
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            OracleError::Malformed(err.to_string())
        } else {
            OracleError::Unavailable(err.to_string())
        }
    }
}

/// Source of candidate rewrites.
#[async_trait]
pub trait RewriteOracle: Send + Sync {
    /// Produce one rewrite of `text`. May be slow or fail.
    async fn rewrite(&self, text: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Rewrites through `{base_url}/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    prompt: String,
    timeout: Duration,
}

impl OllamaOracle {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            prompt: DEFAULT_PROMPT.to_string(),
            timeout,
        })
    }

    /// Replace the prompt template. `{text}` marks where the draft goes;
    /// a template without it gets the draft appended.
    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt = template.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn render_prompt(&self, text: &str) -> String {
        if self.prompt.contains("{text}") {
            self.prompt.replace("{text}", text)
        } else {
            format!("{}\n\n{}", self.prompt, text)
        }
    }
}

#[async_trait]
impl RewriteOracle for OllamaOracle {
    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
    async fn rewrite(&self, text: &str) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt: self.render_prompt(text),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.timeout)
                } else {
                    OracleError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        let rewrite = parsed.response.trim();
        if rewrite.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        debug!(chars = rewrite.len(), "rewrite received");
        Ok(rewrite.to_string())
    }
}
