//! Append-only, human-readable log of accepted versions.
//!
//! One line per acceptance:
//!
//! ```text
//! 2026-10-16 09:12:44 | Version 3 | Score: 58.214 | Similarity: 0.912 | Readability: 64.2 | Errors: 1
//! ```
//!
//! The file is only ever opened in append mode.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use redraft_state::RewardRecord;
use tokio::io::AsyncWriteExt;

use crate::domain::{Result, RevisionError};

/// Default log location, relative to the working directory.
pub const DEFAULT_PROGRESSION_LOG: &str = "reward_progression.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One accepted version as recorded in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionEntry {
    pub timestamp: DateTime<Utc>,
    pub version: u64,
    pub record: RewardRecord,
}

impl ProgressionEntry {
    pub fn new(version: u64, record: RewardRecord) -> Self {
        Self {
            timestamp: Utc::now(),
            version,
            record,
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} | Version {} | Score: {} | Similarity: {} | Readability: {} | Errors: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.version,
            self.record.score,
            self.record.similarity,
            self.record.readability,
            self.record.errors,
        )
    }

    /// Parse a line written by [`ProgressionEntry::to_line`].
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split(" | ");
        let timestamp = NaiveDateTime::parse_from_str(parts.next()?, TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();
        let version = parts.next()?.strip_prefix("Version ")?.parse().ok()?;
        let score = field(parts.next()?, "Score: ")?;
        let similarity = field(parts.next()?, "Similarity: ")?;
        let readability = field(parts.next()?, "Readability: ")?;
        let errors = field(parts.next()?, "Errors: ")?;
        Some(Self {
            timestamp,
            version,
            record: RewardRecord {
                similarity,
                readability,
                errors,
                score,
            },
        })
    }
}

fn field<T: std::str::FromStr>(part: &str, prefix: &str) -> Option<T> {
    part.strip_prefix(prefix)?.trim().parse().ok()
}

/// Handle on the progression log file.
#[derive(Debug, Clone)]
pub struct ProgressionLog {
    path: PathBuf,
}

impl ProgressionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line for an accepted version.
    pub async fn append(&self, entry: &ProgressionEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = entry.to_line();
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every parseable entry. A missing file reads as empty.
    pub async fn read_all(&self) -> Result<Vec<ProgressionEntry>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RevisionError::Io(e)),
        };
        let mut entries = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match ProgressionEntry::parse_line(line) {
                Some(entry) => entries.push(entry),
                None => tracing::warn!(line = %line, "skipping unparseable progression line"),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: f64) -> RewardRecord {
        RewardRecord {
            similarity: 0.912,
            readability: 64.2,
            errors: 1,
            score,
        }
    }

    #[test]
    fn line_format_is_pipe_separated() {
        let entry = ProgressionEntry {
            timestamp: NaiveDateTime::parse_from_str("2026-10-16 09:12:44", TIMESTAMP_FORMAT)
                .unwrap()
                .and_utc(),
            version: 3,
            record: record(58.214),
        };
        assert_eq!(
            entry.to_line(),
            "2026-10-16 09:12:44 | Version 3 | Score: 58.214 | Similarity: 0.912 | Readability: 64.2 | Errors: 1"
        );
        assert_eq!(ProgressionEntry::parse_line(&entry.to_line()), Some(entry));
    }

    #[test]
    fn garbage_lines_do_not_parse() {
        assert!(ProgressionEntry::parse_line("hello world").is_none());
        assert!(ProgressionEntry::parse_line("2026-10-16 09:12:44 | Version x").is_none());
    }

    #[tokio::test]
    async fn append_never_rewrites_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("progression.log");
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, "legacy line\n").await.unwrap();

        let log = ProgressionLog::new(&path);
        log.append(&ProgressionEntry::new(1, record(50.0)))
            .await
            .unwrap();
        log.append(&ProgressionEntry::new(2, record(51.5)))
            .await
            .unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.starts_with("legacy line\n"));
        assert_eq!(text.lines().count(), 3);

        let entries = log.read_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].version, 2);
        assert_eq!(entries[1].record.score, 51.5);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProgressionLog::new(dir.path().join("absent.log"));
        assert!(log.read_all().await.unwrap().is_empty());
    }
}
