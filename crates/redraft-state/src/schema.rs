//! Row definitions for the redraft SurrealDB tables
//!
//! Rows are converted to and from the `storage_traits` types at the
//! backend boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage_traits::{ContentDigest, Version, VersionMetadata};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Version row stored in SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRow {
    /// SurrealDB record ID (`versions:<version_number>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Assigned version number
    pub version_number: u64,
    /// Draft text
    pub content: String,
    /// SHA-256 hex of `content`
    pub content_digest: String,
    /// Acceptance timestamp
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    /// Origin, reward and note
    pub metadata: VersionMetadata,
}

impl VersionRow {
    /// Build a fresh row for `content`, stamped with the current time.
    pub fn new(version_number: u64, content: &str, metadata: VersionMetadata) -> Self {
        VersionRow {
            id: None,
            version_number,
            content: content.to_string(),
            content_digest: ContentDigest::of_text(content).as_str().to_string(),
            created_at: Utc::now(),
            metadata,
        }
    }

    /// Convert into the backend-agnostic [`Version`].
    pub fn into_version(self) -> Result<Version, StorageError> {
        Ok(Version {
            version_number: self.version_number,
            content_digest: ContentDigest::try_from(self.content_digest)?,
            content: self.content,
            created_at: self.created_at,
            metadata: self.metadata,
        })
    }
}
