//! SurrealDB-backed VersionStore implementation
//!
//! Uses `schema::VersionRow` for persistence, converting to/from
//! `storage_traits` types at the boundary.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::handle::{self, StoreTarget};
use crate::migrations::VERSIONS_TABLE;
use crate::schema::VersionRow;
use crate::storage_traits::{
    validate_content, Version, VersionMetadata, VersionStore, StorageResult, SEED_VERSION,
};

/// How long an appender keeps retrying after losing races before it
/// reports `VersionConflict`.
const APPEND_RETRY_BUDGET: Duration = Duration::from_secs(30);

/// First backoff step; doubles per attempt up to `BACKOFF_MAX_MS`.
const BACKOFF_BASE_MS: u64 = 2;
const BACKOFF_MAX_MS: u64 = 250;

/// Reads the current maximum and creates `versions:<max + 1>` inside one
/// transaction. A concurrent appender that commits the same number first
/// makes this transaction fail with a retryable conflict.
const APPEND_QUERY: &str = r#"
    BEGIN TRANSACTION;
    LET $last = (SELECT version_number FROM versions ORDER BY version_number DESC LIMIT 1)[0].version_number;
    LET $next = IF $last = NONE { $seed } ELSE { $last + 1 };
    CREATE type::thing('versions', $next) SET
        version_number = $next,
        content = $content,
        content_digest = $content_digest,
        created_at = $created_at,
        metadata = $metadata
        RETURN version_number;
    COMMIT TRANSACTION;
"#;

/// SurrealDB-backed implementation of [`VersionStore`].
///
/// Each version is stored under the record id `versions:<n>`, so two
/// writers can never both commit the same number. Number assignment and
/// the write run in a single transaction; the loser of a race backs off
/// with jitter and tries again against the new maximum.
#[derive(Clone)]
pub struct SurrealVersionStore {
    db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct NumberRow {
    version_number: u64,
}

/// Exponential backoff with full jitter, bounded by a wall-clock budget.
struct Backoff {
    attempt: u32,
    deadline: Instant,
}

impl Backoff {
    fn new() -> Self {
        Self {
            attempt: 0,
            deadline: Instant::now() + APPEND_RETRY_BUDGET,
        }
    }

    /// Count an attempt that lost a race and sleep before the next one.
    async fn retry(&mut self) -> StorageResult<()> {
        self.attempt += 1;
        if Instant::now() >= self.deadline {
            return Err(StorageError::VersionConflict {
                attempts: self.attempt,
            });
        }
        tokio::time::sleep(jittered_delay(self.attempt)).await;
        Ok(())
    }
}

fn jittered_delay(attempt: u32) -> Duration {
    let ceiling = BACKOFF_BASE_MS
        .saturating_mul(1 << attempt.min(16))
        .min(BACKOFF_MAX_MS);
    Duration::from_millis(rand::rng().random_range(0..=ceiling))
}

impl SurrealVersionStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&StoreTarget::Memory).await
    }

    /// Connect to the given target and initialise the schema.
    pub async fn connect(target: &StoreTarget) -> crate::Result<Self> {
        let db = handle::connect(target).await?;
        info!(target = %target, "SurrealVersionStore connected");
        Ok(Self { db })
    }

    /// Connect using environment variables (see [`StoreTarget::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        Self::connect(&StoreTarget::from_env()).await
    }

    // -- private helpers -----------------------------------------------------

    async fn is_empty(&self) -> StorageResult<bool> {
        let mut res = self
            .db
            .query("SELECT version_number FROM versions LIMIT 1")
            .await
            .map_err(map_db_error)?;

        let rows: Vec<NumberRow> = res.take(0).map_err(map_db_error)?;
        Ok(rows.is_empty())
    }

    /// One transactional append. `Ok(None)` means the attempt lost a race.
    async fn try_append(&self, row: &VersionRow) -> StorageResult<Option<u64>> {
        let mut response = self
            .db
            .query(APPEND_QUERY)
            .bind(("seed", SEED_VERSION as i64))
            .bind(("content", row.content.clone()))
            .bind(("content_digest", row.content_digest.clone()))
            .bind(("created_at", SurrealDatetime::from(row.created_at)))
            .bind(("metadata", row.metadata.clone()))
            .await
            .map_err(map_db_error)?;

        let errors = response.take_errors();
        if errors.values().any(is_write_conflict) {
            return Ok(None);
        }
        if let Some(err) = errors.into_values().next() {
            return Err(map_db_error(err));
        }

        // LET statements answer NONE; the CREATE is the only one with a row.
        for index in (0..response.num_statements()).rev() {
            let created: Option<NumberRow> = response.take(index).map_err(map_db_error)?;
            if let Some(created) = created {
                return Ok(Some(created.version_number));
            }
        }
        Err(StorageError::Backend(
            "append transaction returned no row".to_string(),
        ))
    }
}

/// Map a SurrealDB error: client-side API failures mean the backend could
/// not be reached, anything else is a failed operation.
fn map_db_error(err: surrealdb::Error) -> StorageError {
    match err {
        surrealdb::Error::Api(e) => StorageError::Unavailable(e.to_string()),
        other => StorageError::Backend(other.to_string()),
    }
}

/// Whether a failed write lost a race for the version number.
fn is_write_conflict(err: &surrealdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("already exists")
        || msg.contains("already contains")
        || msg.contains("can be retried")
        || msg.contains("conflict")
}

#[async_trait]
impl VersionStore for SurrealVersionStore {
    #[instrument(skip(self, content, metadata), fields(origin = %metadata.origin))]
    async fn append(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64> {
        validate_content(content)?;
        let row = VersionRow::new(SEED_VERSION, content, metadata);

        let mut backoff = Backoff::new();
        loop {
            if let Some(version) = self.try_append(&row).await? {
                debug!(version, retries = backoff.attempt, "version appended");
                return Ok(version);
            }
            debug!(attempt = backoff.attempt + 1, "version number taken, backing off");
            backoff.retry().await?;
        }
    }

    /// `versions:<SEED_VERSION>` exists exactly when the corpus is non-empty,
    /// so creating that record is the emptiness check.
    #[instrument(skip(self, content, metadata))]
    async fn seed(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64> {
        validate_content(content)?;
        let row = VersionRow::new(SEED_VERSION, content, metadata);

        let mut backoff = Backoff::new();
        loop {
            let created: Result<Option<VersionRow>, surrealdb::Error> = self
                .db
                .create((VERSIONS_TABLE, SEED_VERSION as i64))
                .content(row.clone())
                .await;

            match created {
                Ok(Some(_)) => {
                    debug!(version = SEED_VERSION, "corpus seeded");
                    return Ok(SEED_VERSION);
                }
                Ok(None) => {
                    return Err(StorageError::Backend(
                        "create of seed version returned no row".to_string(),
                    ))
                }
                Err(e) if is_write_conflict(&e) => {
                    if !self.is_empty().await? {
                        return Err(StorageError::AlreadySeeded);
                    }
                    backoff.retry().await?;
                }
                Err(e) => return Err(map_db_error(e)),
            }
        }
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> StorageResult<Vec<Version>> {
        let mut res = self
            .db
            .query("SELECT * FROM versions ORDER BY version_number ASC")
            .await
            .map_err(map_db_error)?;

        let rows: Vec<VersionRow> = res.take(0).map_err(map_db_error)?;
        rows.into_iter().map(VersionRow::into_version).collect()
    }

    #[instrument(skip(self))]
    async fn get(&self, version_number: u64) -> StorageResult<Version> {
        let row: Option<VersionRow> = self
            .db
            .select((VERSIONS_TABLE, version_number as i64))
            .await
            .map_err(map_db_error)?;

        row.ok_or(StorageError::VersionNotFound {
            version: version_number,
        })?
        .into_version()
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> StorageResult<()> {
        self.db
            .query("DELETE versions")
            .await
            .map_err(map_db_error)?
            .check()
            .map_err(map_db_error)?;
        info!("corpus reset");
        Ok(())
    }
}
