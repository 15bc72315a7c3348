//! SurrealDB connection handling
//!
//! Resolves where the corpus lives and opens a ready-to-use connection:
//! - in-memory (`mem://`) for tests and throwaway runs
//! - local embedded persistence (`surrealkv://<path>`)
//! - any other SurrealDB URL
//! - SurrealDB Cloud over WebSocket with credentials

use std::path::PathBuf;

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

/// Default namespace for redraft data
pub const DEFAULT_NAMESPACE: &str = "redraft";
/// Default database name
pub const DEFAULT_DATABASE: &str = "drafts";
/// Default on-disk location for the local backend
pub const DEFAULT_LOCAL_PATH: &str = ".redraft/db";

/// Credentials for an authenticated SurrealDB instance (e.g. SurrealDB Cloud)
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint, e.g. `wss://xxx.aws-use1.surrealdb.cloud`
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
    /// Sign in as root user instead of database user
    pub is_root: bool,
}

impl CloudConfig {
    /// Read `SURREALDB_ENDPOINT`, `SURREALDB_USERNAME` and
    /// `SURREALDB_PASSWORD` (required) plus `SURREALDB_NAMESPACE`,
    /// `SURREALDB_DATABASE` and `SURREALDB_ROOT` (optional).
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CloudConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| format!("{key} not set"));
        Ok(Self {
            endpoint: required("SURREALDB_ENDPOINT")?,
            username: required("SURREALDB_USERNAME")?,
            password: required("SURREALDB_PASSWORD")?,
            namespace: lookup("SURREALDB_NAMESPACE")
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            database: lookup("SURREALDB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            is_root: lookup("SURREALDB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

/// Where the corpus is stored
#[derive(Debug, Clone)]
pub enum StoreTarget {
    /// Ephemeral in-process database
    Memory,
    /// Embedded on-disk database at the given directory
    Local(PathBuf),
    /// Any SurrealDB connection string (`ws://`, `http://`, `surrealkv://`, ...)
    Url(String),
    /// Authenticated SurrealDB Cloud instance
    Cloud(CloudConfig),
}

impl StoreTarget {
    /// Parse a user-supplied location.
    ///
    /// `mem://` selects the in-memory backend, strings containing `://` are
    /// passed through as URLs, anything else is treated as a local directory.
    pub fn parse(location: &str) -> Self {
        if location == "mem://" || location == "memory" {
            StoreTarget::Memory
        } else if location.contains("://") {
            StoreTarget::Url(location.to_string())
        } else {
            StoreTarget::Local(PathBuf::from(location))
        }
    }

    /// Resolve from environment variables.
    ///
    /// If SURREALDB_ENDPOINT is set, connects to cloud.
    /// If SURREALDB_URL is set, connects to that URL.
    /// Otherwise, falls back to local persistence in `.redraft/db`.
    pub fn from_env() -> Self {
        if let Ok(config) = CloudConfig::from_env() {
            return StoreTarget::Cloud(config);
        }
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return StoreTarget::parse(&url);
        }
        StoreTarget::Local(PathBuf::from(DEFAULT_LOCAL_PATH))
    }
}

impl std::fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreTarget::Memory => f.write_str("mem://"),
            StoreTarget::Local(path) => write!(f, "surrealkv://{}", path.display()),
            StoreTarget::Url(url) => f.write_str(url),
            StoreTarget::Cloud(config) => f.write_str(&config.endpoint),
        }
    }
}

/// Open a connection to `target`, select namespace/database and run the
/// schema initialisation.
#[instrument(skip_all, fields(target = %target))]
pub async fn connect(target: &StoreTarget) -> Result<Surreal<Any>> {
    let db = match target {
        StoreTarget::Memory => open(&target.to_string()).await?,
        StoreTarget::Local(path) => {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
            open(&target.to_string()).await?
        }
        StoreTarget::Url(url) => open(url).await?,
        StoreTarget::Cloud(config) => {
            let db = open(&config.endpoint).await?;
            if config.is_root {
                db.signin(Root {
                    username: &config.username,
                    password: &config.password,
                })
                .await
                .map_err(|e| StateError::Connection(format!("Root authentication failed: {e}")))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &config.username,
                    password: &config.password,
                })
                .await
                .map_err(|e| {
                    StateError::Connection(format!("Database authentication failed: {e}"))
                })?;
            }
            db.use_ns(&config.namespace)
                .use_db(&config.database)
                .await
                .map_err(|e| {
                    StateError::Connection(format!("Failed to select namespace/database: {e}"))
                })?;
            migrations::init_schema(&db).await?;
            info!("SurrealDB Cloud connected and schema initialized");
            return Ok(db);
        }
    };

    db.use_ns(DEFAULT_NAMESPACE)
        .use_db(DEFAULT_DATABASE)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    info!("SurrealDB connected and schema initialized");
    Ok(db)
}

async fn open(url: &str) -> Result<Surreal<Any>> {
    surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {url}: {e}")))
}
