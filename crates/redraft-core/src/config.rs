//! Layered settings: built-in defaults, then an optional TOML file, then
//! environment variables. The CLI applies its flags on top.
//!
//! ```toml
//! [reward]
//! similarity = 0.9
//! readability = 0.9
//! errors = 0.3
//!
//! [search]
//! iterations = 5
//! patience = 3
//! oracle_timeout_secs = 120
//! reference_file = "chapter1.txt"
//!
//! [oracle]
//! url = "http://localhost:11434"
//! model = "mistral"
//!
//! [storage]
//! url = "surrealkv://.redraft/db"
//!
//! [log]
//! progression_log = "reward_progression.log"
//! evaluation_log = "evaluations.jsonl"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use redraft_state::StoreTarget;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Result, RevisionError, RewardWeights};
use crate::evaluation_log::{EvaluationLog, DEFAULT_EVALUATION_LOG};
use crate::oracle::{OllamaOracle, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::progression_log::{ProgressionLog, DEFAULT_PROGRESSION_LOG};
use crate::reward::embedding::DEFAULT_EMBEDDING_MODEL;
use crate::reward::languagetool::DEFAULT_LANGUAGE;
use crate::reward::{FleschReadingEase, LanguageToolChecker, OllamaEmbeddingSimilarity, RewardEvaluator};
use crate::search::{SearchConfig, DEFAULT_INITIAL_DRAFT, DEFAULT_ITERATIONS};

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "redraft.toml";

/// Default LanguageTool server
pub const DEFAULT_LANGUAGETOOL_URL: &str = "http://localhost:8081";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub iterations: usize,
    pub patience: Option<usize>,
    pub oracle_timeout_secs: u64,
    /// Inline seed draft; `initial_draft_file` wins when both are set
    pub initial_draft: Option<String>,
    pub initial_draft_file: Option<PathBuf>,
    pub reference_file: Option<PathBuf>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            patience: None,
            oracle_timeout_secs: 120,
            initial_draft: None,
            initial_draft_file: None,
            reference_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub url: String,
    pub model: String,
    /// Prompt template; `{text}` is replaced with the draft
    pub prompt: Option<String>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerSettings {
    pub embedding_url: String,
    pub embedding_model: String,
    pub languagetool_url: String,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            embedding_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            languagetool_url: DEFAULT_LANGUAGETOOL_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Store location; unset falls back to the `SURREALDB_*` environment
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub progression_log: PathBuf,
    pub evaluation_log: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            progression_log: PathBuf::from(DEFAULT_PROGRESSION_LOG),
            evaluation_log: PathBuf::from(DEFAULT_EVALUATION_LOG),
        }
    }
}

/// Complete redraft configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reward: RewardWeights,
    pub search: SearchSettings,
    pub oracle: OracleSettings,
    pub scorers: ScorerSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RevisionError::Config(e.to_string()))
    }

    /// Load `path`, or `redraft.toml` from the working directory when it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::read_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_env_from(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RevisionError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&text)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Reads `REDRAFT_ITERATIONS`, `REDRAFT_PATIENCE`,
    /// `REDRAFT_ORACLE_TIMEOUT_SECS`, `REDRAFT_WEIGHT_SIMILARITY`,
    /// `REDRAFT_WEIGHT_READABILITY`, `REDRAFT_WEIGHT_ERRORS`, `OLLAMA_URL`,
    /// `REDRAFT_MODEL`, `REDRAFT_EMBEDDING_MODEL`, `LANGUAGETOOL_URL`,
    /// `REDRAFT_LANGUAGE`, `REDRAFT_STORE`, `REDRAFT_PROGRESSION_LOG` and
    /// `REDRAFT_EVALUATION_LOG`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("REDRAFT_ITERATIONS") {
            self.search.iterations = parse_var("REDRAFT_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("REDRAFT_PATIENCE") {
            self.search.patience = Some(parse_var("REDRAFT_PATIENCE", &v)?);
        }
        if let Some(v) = lookup("REDRAFT_ORACLE_TIMEOUT_SECS") {
            self.search.oracle_timeout_secs = parse_var("REDRAFT_ORACLE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("REDRAFT_WEIGHT_SIMILARITY") {
            self.reward.similarity = parse_var("REDRAFT_WEIGHT_SIMILARITY", &v)?;
        }
        if let Some(v) = lookup("REDRAFT_WEIGHT_READABILITY") {
            self.reward.readability = parse_var("REDRAFT_WEIGHT_READABILITY", &v)?;
        }
        if let Some(v) = lookup("REDRAFT_WEIGHT_ERRORS") {
            self.reward.errors = parse_var("REDRAFT_WEIGHT_ERRORS", &v)?;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.oracle.url = url.clone();
            self.scorers.embedding_url = url;
        }
        if let Some(model) = lookup("REDRAFT_MODEL") {
            self.oracle.model = model;
        }
        if let Some(model) = lookup("REDRAFT_EMBEDDING_MODEL") {
            self.scorers.embedding_model = model;
        }
        if let Some(url) = lookup("LANGUAGETOOL_URL") {
            self.scorers.languagetool_url = url;
        }
        if let Some(language) = lookup("REDRAFT_LANGUAGE") {
            self.scorers.language = language;
        }
        if let Some(url) = lookup("REDRAFT_STORE") {
            self.storage.url = Some(url);
        }
        if let Some(path) = lookup("REDRAFT_PROGRESSION_LOG") {
            self.log.progression_log = PathBuf::from(path);
        }
        if let Some(path) = lookup("REDRAFT_EVALUATION_LOG") {
            self.log.evaluation_log = PathBuf::from(path);
        }
        Ok(())
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
        let w = &self.reward;
        if !(w.similarity.is_finite() && w.readability.is_finite() && w.errors.is_finite()) {
            return Err(RevisionError::Config(
                "reward weights must be finite numbers".to_string(),
            ));
        }
        if self.search.oracle_timeout_secs == 0 {
            return Err(RevisionError::Config(
                "search.oracle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.search.patience == Some(0) {
            return Err(RevisionError::Config(
                "search.patience must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.search.oracle_timeout_secs)
    }

    pub fn store_target(&self) -> StoreTarget {
        match &self.storage.url {
            Some(url) => StoreTarget::parse(url),
            None => StoreTarget::from_env(),
        }
    }

    pub fn progression_log(&self) -> ProgressionLog {
        ProgressionLog::new(&self.log.progression_log)
    }

    pub fn evaluation_log(&self) -> EvaluationLog {
        EvaluationLog::new(&self.log.evaluation_log)
    }

    /// Build the HTTP-backed evaluator described by these settings.
    pub fn evaluator(&self) -> Result<RewardEvaluator> {
        let timeout = Duration::from_secs(self.scorers.timeout_secs.max(1));
        let similarity = OllamaEmbeddingSimilarity::new(
            &self.scorers.embedding_url,
            &self.scorers.embedding_model,
            timeout,
        )
        .map_err(|e| RevisionError::Config(e.to_string()))?;
        let grammar = LanguageToolChecker::new(
            &self.scorers.languagetool_url,
            &self.scorers.language,
            timeout,
        )
        .map_err(|e| RevisionError::Config(e.to_string()))?;
        Ok(RewardEvaluator::new(
            Arc::new(similarity),
            Arc::new(FleschReadingEase::new()),
            Arc::new(grammar),
        )
        .with_weights(self.reward))
    }

    /// Build the rewriting oracle described by these settings.
    pub fn oracle(&self) -> Result<OllamaOracle> {
        let oracle = OllamaOracle::new(&self.oracle.url, &self.oracle.model, self.oracle_timeout())?;
        Ok(match &self.oracle.prompt {
            Some(prompt) => oracle.with_prompt(prompt),
            None => oracle,
        })
    }

    /// Read the reference text, if one is configured.
    pub async fn reference_text(&self) -> Result<Option<String>> {
        match &self.search.reference_file {
            Some(path) => Ok(Some(read_text(path).await?)),
            None => Ok(None),
        }
    }

    /// Resolve the search configuration, reading any referenced files.
    pub async fn search_config(&self) -> Result<SearchConfig> {
        let initial_draft = match (&self.search.initial_draft_file, &self.search.initial_draft) {
            (Some(path), _) => read_text(path).await?,
            (None, Some(text)) => text.clone(),
            (None, None) => DEFAULT_INITIAL_DRAFT.to_string(),
        };
        Ok(SearchConfig {
            iterations: self.search.iterations,
            patience: self.search.patience,
            oracle_timeout: self.oracle_timeout(),
            initial_draft,
            reference_text: self.reference_text().await?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RevisionError::Config(format!("{key} has an invalid value: {value:?}")))
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RevisionError::Config(format!("cannot read {}: {e}", path.display())))
}
