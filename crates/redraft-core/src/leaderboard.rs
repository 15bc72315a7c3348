//! Read side of the corpus: ranking, pairwise diff and score progression.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redraft_state::{RewardRecord, Version, VersionOrigin, VersionStore};
use serde::Serialize;
use tracing::{debug, info};

use crate::diff::{unified_diff, DEFAULT_CONTEXT};
use crate::domain::Result;
use crate::reward::RewardEvaluator;

/// One ranked version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub version: u64,
    pub score: f64,
    pub similarity: f64,
    pub readability: f64,
    pub errors: u32,
    pub created_at: DateTime<Utc>,
    pub origin: VersionOrigin,
    /// The version had no stored reward and was scored on the fly
    pub rescored: bool,
}

impl LeaderboardEntry {
    fn new(version: &Version, record: RewardRecord, rescored: bool) -> Self {
        Self {
            version: version.version_number,
            score: record.score,
            similarity: record.similarity,
            readability: record.readability,
            errors: record.errors,
            created_at: version.created_at,
            origin: version.metadata.origin,
            rescored,
        }
    }
}

/// Ranks and compares stored versions.
///
/// Versions without a stored reward record are rescored when an evaluator is
/// configured and left out otherwise.
pub struct Leaderboard {
    store: Arc<dyn VersionStore>,
    evaluator: Option<RewardEvaluator>,
    reference: Option<String>,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            evaluator: None,
            reference: None,
        }
    }

    /// Score unrewarded versions with `evaluator` against `reference`.
    pub fn with_evaluator(mut self, evaluator: RewardEvaluator, reference: Option<String>) -> Self {
        self.evaluator = Some(evaluator);
        self.reference = reference;
        self
    }

    /// Every scored version in ascending version order.
    async fn scored_versions(&self) -> Result<Vec<LeaderboardEntry>> {
        let mut versions = self.store.list_all().await?;
        versions.sort_by_key(|v| v.version_number);

        let mut entries = Vec::with_capacity(versions.len());
        let mut omitted = 0usize;
        for version in &versions {
            match (version.metadata.reward, &self.evaluator) {
                (Some(record), _) => entries.push(LeaderboardEntry::new(version, record, false)),
                (None, Some(evaluator)) => {
                    let evaluation = evaluator
                        .evaluate(&version.content, self.reference.as_deref())
                        .await?;
                    entries.push(LeaderboardEntry::new(version, evaluation.record, true));
                }
                (None, None) => omitted += 1,
            }
        }
        if omitted > 0 {
            info!(omitted, "versions without a reward record left off the leaderboard");
        }
        Ok(entries)
    }

    /// All scored versions, best first. Equal scores rank the older version
    /// first.
    pub async fn rank_all(&self) -> Result<Vec<LeaderboardEntry>> {
        let mut entries = self.scored_versions().await?;
        entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.version.cmp(&b.version))
        });
        debug!(entries = entries.len(), "leaderboard ranked");
        Ok(entries)
    }

    /// The top-ranked version, if any.
    pub async fn best(&self) -> Result<Option<LeaderboardEntry>> {
        Ok(self.rank_all().await?.into_iter().next())
    }

    /// Unified diff from version `a` to version `b`.
    ///
    /// Both versions are fetched before any output is produced, so a missing
    /// version yields `VersionNotFound` and nothing else. Identical contents
    /// yield an empty string.
    pub async fn diff(&self, a: u64, b: u64) -> Result<String> {
        let version_a = self.store.get(a).await?;
        let version_b = self.store.get(b).await?;
        let lines = unified_diff(
            &version_a.content,
            &version_b.content,
            &format!("Version {a}"),
            &format!("Version {b}"),
            DEFAULT_CONTEXT,
        );
        Ok(lines.join("\n"))
    }

    /// `(version_number, score)` pairs in version order.
    pub async fn progression_series(&self) -> Result<Vec<(u64, f64)>> {
        Ok(self
            .scored_versions()
            .await?
            .into_iter()
            .map(|e| (e.version, e.score))
            .collect())
    }
}
