//! Storage trait definitions for redraft
//!
//! `VersionStore` is the system of record for which drafts exist:
//! an append-only corpus of text snapshots, each identified by a
//! strictly increasing version number.
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Version number assigned to the first draft of an empty corpus.
pub const SEED_VERSION: u64 = 0;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string) of a draft's text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given text.
    pub fn of_text(text: &str) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::Serialization(format!(
                "invalid content digest: {s}"
            )));
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Reward records
// ---------------------------------------------------------------------------

/// Scoring result attached to an accepted version.
///
/// All fields are already rounded to three decimal places by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// Semantic closeness to the reference text (0 when unavailable)
    pub similarity: f64,
    /// Reading-ease score, higher is easier
    pub readability: f64,
    /// Number of grammar/style issues found
    pub errors: u32,
    /// Weighted composite used for ranking and acceptance
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// How a version entered the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    /// First draft of an empty corpus
    Seed,
    /// Candidate accepted by the search loop
    Search,
    /// Edit approved by a human reviewer
    Manual,
}

impl VersionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionOrigin::Seed => "seed",
            VersionOrigin::Search => "search",
            VersionOrigin::Manual => "manual",
        }
    }
}

impl std::fmt::Display for VersionOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied metadata for [`VersionStore::append`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Where the draft came from
    pub origin: VersionOrigin,
    /// The canonical score that justified accepting this version
    pub reward: Option<RewardRecord>,
    /// Free-form note (reviewer comment, run id, ...)
    pub note: Option<String>,
}

impl VersionMetadata {
    pub fn new(origin: VersionOrigin) -> Self {
        Self {
            origin,
            reward: None,
            note: None,
        }
    }

    pub fn with_reward(mut self, reward: RewardRecord) -> Self {
        self.reward = Some(reward);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// An immutable snapshot of a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub version_number: u64,
    pub content: String,
    pub content_digest: ContentDigest,
    pub created_at: DateTime<Utc>,
    pub metadata: VersionMetadata,
}

/// Reject content that is empty after trimming.
pub fn validate_content(content: &str) -> StorageResult<()> {
    if content.trim().is_empty() {
        return Err(StorageError::InvalidContent(
            "draft content must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Next version number given the numbers already in the corpus.
pub fn next_version_number<I>(existing: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    existing
        .into_iter()
        .max()
        .map(|max| max + 1)
        .unwrap_or(SEED_VERSION)
}

/// Append-only store of draft versions.
///
/// Guarantees:
/// - `append` assigns `max(existing) + 1`, or [`SEED_VERSION`] on an empty
///   corpus, and never hands the same number to two appenders.
/// - Versions are immutable once appended.
/// - `list_all` makes no ordering promise; sort by `version_number`.
/// - A backend that cannot be reached fails loudly instead of reporting an
///   empty corpus.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Store a new version and return its assigned number.
    async fn append(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64>;

    /// Store `content` as [`SEED_VERSION`] if and only if the corpus is
    /// empty. The emptiness check and the write are one atomic step; a
    /// caller that loses to any other writer gets
    /// `StorageError::AlreadySeeded`.
    async fn seed(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64>;

    /// Return every stored version.
    async fn list_all(&self) -> StorageResult<Vec<Version>>;

    /// Fetch one version. Returns `StorageError::VersionNotFound` if absent.
    async fn get(&self, version_number: u64) -> StorageResult<Version>;

    /// Discard the whole corpus. Administrative only.
    async fn reset(&self) -> StorageResult<()>;

    /// The version with the highest number, `None` for an empty corpus.
    async fn latest(&self) -> StorageResult<Option<Version>> {
        let versions = self.list_all().await?;
        Ok(versions.into_iter().max_by_key(|v| v.version_number))
    }
}
