//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryVersionStore` satisfies the `VersionStore` contract without any
//! external dependencies. It can also be switched into an "unreachable"
//! mode to exercise the failure paths of callers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory version store backed by a `BTreeMap<version_number, Version>`.
///
/// Number assignment and insertion happen under a single lock, so
/// concurrent appenders always receive distinct numbers.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    versions: Mutex<BTreeMap<u64, Version>>,
    unavailable: AtomicBool,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StorageError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory store switched offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn new_version(version_number: u64, content: &str, metadata: VersionMetadata) -> Version {
    Version {
        version_number,
        content: content.to_string(),
        content_digest: ContentDigest::of_text(content),
        created_at: Utc::now(),
        metadata,
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn append(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64> {
        self.check_available()?;
        validate_content(content)?;

        let mut versions = self.versions.lock().unwrap();
        let version_number = next_version_number(versions.keys().copied());
        versions.insert(version_number, new_version(version_number, content, metadata));
        Ok(version_number)
    }

    async fn seed(&self, content: &str, metadata: VersionMetadata) -> StorageResult<u64> {
        self.check_available()?;
        validate_content(content)?;

        let mut versions = self.versions.lock().unwrap();
        if !versions.is_empty() {
            return Err(StorageError::AlreadySeeded);
        }
        versions.insert(SEED_VERSION, new_version(SEED_VERSION, content, metadata));
        Ok(SEED_VERSION)
    }

    async fn list_all(&self) -> StorageResult<Vec<Version>> {
        self.check_available()?;
        let versions = self.versions.lock().unwrap();
        Ok(versions.values().cloned().collect())
    }

    async fn get(&self, version_number: u64) -> StorageResult<Version> {
        self.check_available()?;
        let versions = self.versions.lock().unwrap();
        versions
            .get(&version_number)
            .cloned()
            .ok_or(StorageError::VersionNotFound {
                version: version_number,
            })
    }

    async fn reset(&self) -> StorageResult<()> {
        self.check_available()?;
        self.versions.lock().unwrap().clear();
        Ok(())
    }
}
