//! Grammar checking through a LanguageTool server (`/v2/check`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::scorers::{GrammarChecker, ScorerError};

/// Default LanguageTool language code
pub const DEFAULT_LANGUAGE: &str = "en-US";

#[derive(Debug, Deserialize)]
struct CheckResponse {
    matches: Vec<serde_json::Value>,
}

/// Counts the matches LanguageTool reports for a text.
#[derive(Debug, Clone)]
pub struct LanguageToolChecker {
    client: reqwest::Client,
    base_url: String,
    language: String,
}

impl LanguageToolChecker {
    pub fn new(
        base_url: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ScorerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScorerError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: language.into(),
        })
    }
}

#[async_trait]
impl GrammarChecker for LanguageToolChecker {
    async fn check(&self, text: &str) -> Result<u32, ScorerError> {
        let url = format!("{}/v2/check", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[("language", self.language.as_str()), ("text", text)])
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

        let parsed: CheckResponse = response
            .json()
            .await
            .map_err(|e| ScorerError::Malformed(e.to_string()))?;
        debug!(matches = parsed.matches.len(), "grammar check complete");
        Ok(u32::try_from(parsed.matches.len()).unwrap_or(u32::MAX))
    }
}
