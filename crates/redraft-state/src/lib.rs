//! redraft-state: versioned draft corpus
//!
//! This crate is the persistence layer for redraft. Every accepted draft is
//! stored as an immutable, numbered version together with the reward record
//! that justified accepting it.
//!
//! ## Key Components
//!
//! - `VersionStore`: append-only corpus contract
//! - `MemoryVersionStore`: in-memory fake for tests and ephemeral runs
//! - `SurrealVersionStore`: SurrealDB backend (in-memory, embedded or remote)
//! - `StoreTarget` / `CloudConfig`: where the corpus lives

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{connect, CloudConfig, StoreTarget, DEFAULT_LOCAL_PATH};
pub use schema::VersionRow;
pub use storage_traits::{
    next_version_number, validate_content, ContentDigest, RewardRecord, StorageResult, Version,
    VersionMetadata, VersionOrigin, VersionStore, SEED_VERSION,
};
pub use surreal_store::SurrealVersionStore;

/// Result type for redraft-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
