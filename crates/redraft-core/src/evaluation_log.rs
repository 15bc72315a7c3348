//! Append-only audit trail of scored texts, one JSON object per line.
//!
//! Every candidate the search loop scores is recorded here, rejected ones
//! included, along with every text scored by `redraft evaluate`. The file is
//! only ever opened in append mode; `recent` reads it back newest first.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use redraft_state::RewardRecord;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::domain::{Degradation, Evaluation, Result, RevisionError};

/// Default log location, relative to the working directory.
pub const DEFAULT_EVALUATION_LOG: &str = "evaluations.jsonl";

/// Who asked for the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSource {
    /// A rewrite scored inside a search run
    Search,
    /// A text scored on demand
    Evaluate,
}

/// What the search loop did with a scored candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEntry {
    pub timestamp: DateTime<Utc>,
    pub source: EvaluationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Version the text was stored as, for accepted candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub record: RewardRecord,
    #[serde(default)]
    pub degraded: Degradation,
}

impl EvaluationEntry {
    /// Entry for a text scored on demand.
    pub fn evaluated(text: &str, reference: Option<&str>, evaluation: &Evaluation) -> Self {
        Self {
            timestamp: Utc::now(),
            source: EvaluationSource::Evaluate,
            run_id: None,
            iteration: None,
            decision: None,
            version: None,
            text: text.to_string(),
            reference: reference.map(str::to_string),
            record: evaluation.record,
            degraded: evaluation.degraded,
        }
    }

    /// Entry for a candidate scored in iteration `iteration` of run `run_id`.
    pub fn candidate(
        run_id: &str,
        iteration: usize,
        text: &str,
        reference: Option<&str>,
        evaluation: &Evaluation,
        decision: Decision,
    ) -> Self {
        Self {
            source: EvaluationSource::Search,
            run_id: Some(run_id.to_string()),
            iteration: Some(iteration),
            decision: Some(decision),
            ..Self::evaluated(text, reference, evaluation)
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Handle on the evaluation log file.
#[derive(Debug, Clone)]
pub struct EvaluationLog {
    path: PathBuf,
}

impl EvaluationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &EvaluationEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// The last `limit` entries, newest first. A missing file reads as empty.
    pub async fn recent(&self, limit: usize) -> Result<Vec<EvaluationEntry>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RevisionError::Io(e)),
        };

        let mut entries = Vec::new();
        for line in text.lines().rev().filter(|l| !l.trim().is_empty()) {
            if entries.len() == limit {
                break;
            }
            match serde_json::from_str::<EvaluationEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "skipping unparseable evaluation line"),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(score: f64) -> Evaluation {
        Evaluation {
            record: RewardRecord {
                similarity: 0.5,
                readability: 60.0,
                errors: 2,
                score,
            },
            degraded: Degradation {
                grammar: true,
                ..Degradation::default()
            },
        }
    }

    #[test]
    fn candidate_entry_carries_run_and_decision() {
        let entry = EvaluationEntry::candidate(
            "run-1",
            3,
            "A rewrite.",
            Some("The reference."),
            &evaluation(54.4),
            Decision::Rejected,
        );
        assert_eq!(entry.source, EvaluationSource::Search);
        assert_eq!(entry.run_id.as_deref(), Some("run-1"));
        assert_eq!(entry.iteration, Some(3));
        assert_eq!(entry.decision, Some(Decision::Rejected));
        assert!(entry.version.is_none());
        assert!(entry.degraded.grammar);
    }

    #[test]
    fn on_demand_entry_omits_search_fields_in_json() {
        let entry = EvaluationEntry::evaluated("Some text.", None, &evaluation(10.0));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["source"], "evaluate");
        assert!(json.get("run_id").is_none());
        assert!(json.get("reference").is_none());
        assert_eq!(json["record"]["score"], 10.0);
    }

    #[tokio::test]
    async fn recent_returns_newest_first_and_honours_limit() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("audit").join("evaluations.jsonl"));
        for score in [1.0, 2.0, 3.0] {
            log.append(&EvaluationEntry::evaluated("text", None, &evaluation(score)))
                .await
                .unwrap();
        }

        let scores: Vec<f64> = log
            .recent(2)
            .await
            .unwrap()
            .iter()
            .map(|e| e.record.score)
            .collect();
        assert_eq!(scores, vec![3.0, 2.0]);
        assert_eq!(log.recent(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unparseable_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evaluations.jsonl");
        tokio::fs::write(&path, "not json\n").await.unwrap();

        let log = EvaluationLog::new(&path);
        log.append(&EvaluationEntry::evaluated("text", None, &evaluation(7.0)))
            .await
            .unwrap();
        let entries = log.recent(5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.score, 7.0);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("absent.jsonl"));
        assert!(log.recent(5).await.unwrap().is_empty());
    }
}
