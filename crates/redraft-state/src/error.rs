//! Error types for redraft-state

use thiserror::Error;

/// Errors raised while connecting to or preparing a storage backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Invalid backend configuration
    #[error("Invalid storage configuration: {0}")]
    Config(String),
}

/// Errors returned by [`crate::VersionStore`] operations.
///
/// `Unavailable` and `Backend` are deliberately distinct from an empty
/// corpus: a store that cannot be read never answers with `Ok(vec![])`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// The backend could not be reached at all
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but the operation failed
    #[error("storage backend error: {0}")]
    Backend(String),

    /// No version with this number exists
    #[error("version not found: {version}")]
    VersionNotFound { version: u64 },

    /// Version number assignment kept colliding with concurrent appenders
    /// until the retry budget ran out
    #[error("could not assign a version number after {attempts} attempts")]
    VersionConflict { attempts: u32 },

    /// A seed was requested but the corpus already holds a version
    #[error("corpus already seeded")]
    AlreadySeeded,

    /// Content rejected before it reached the backend
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Row could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
