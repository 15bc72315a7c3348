//! Domain-level error taxonomy for redraft.

use redraft_state::StorageError;

use crate::oracle::OracleError;

/// Step of a search iteration, used to report where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    /// Reading the corpus to pick the incumbent
    LoadCorpus,
    /// Seeding an empty corpus
    Seed,
    /// Scoring the incumbent
    EvaluateIncumbent,
    /// Persisting an accepted candidate
    PersistAccepted,
}

impl std::fmt::Display for SearchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchStep::LoadCorpus => "load corpus",
            SearchStep::Seed => "seed corpus",
            SearchStep::EvaluateIncumbent => "evaluate incumbent",
            SearchStep::PersistAccepted => "persist accepted version",
        };
        f.write_str(name)
    }
}

/// redraft domain errors.
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("draft text is empty")]
    EmptyText,

    #[error("version not found: {0}")]
    VersionNotFound(u64),

    #[error("corpus already holds versions; reset it before seeding")]
    CorpusNotEmpty,

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("search failed at iteration {iteration} ({step}): {source}")]
    Search {
        iteration: usize,
        step: SearchStep,
        #[source]
        source: Box<RevisionError>,
    },

    #[error("rewriting oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for RevisionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionNotFound { version } => RevisionError::VersionNotFound(version),
            StorageError::InvalidContent(_) => RevisionError::EmptyText,
            StorageError::AlreadySeeded => RevisionError::CorpusNotEmpty,
            other => RevisionError::Storage(other),
        }
    }
}

impl RevisionError {
    /// Attach the iteration and step at which a search run failed.
    pub fn at(self, iteration: usize, step: SearchStep) -> Self {
        RevisionError::Search {
            iteration,
            step,
            source: Box::new(self),
        }
    }
}

/// Result type for redraft domain operations.
pub type Result<T> = std::result::Result<T, RevisionError>;
