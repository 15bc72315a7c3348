//! SurrealDB schema initialization
//!
//! Safe to call on every connection (idempotent).

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Name of the table holding draft versions
pub const VERSIONS_TABLE: &str = "versions";

/// Initialize all redraft tables in SurrealDB
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing redraft SurrealDB schema");
    init_versions_table(db).await?;
    info!("redraft schema initialization complete");
    Ok(())
}

/// Initialize `versions` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE versions {
///   id:              versions:<version_number>
///   version_number:  INT (unique)
///   content:         STRING
///   content_digest:  STRING
///   created_at:      DATETIME
///   metadata:        OBJECT { origin, reward?, note? }
/// }
/// ```
///
/// Constraints:
/// - The record id is the version number, so two appenders racing for the
///   same number collide on `CREATE` instead of both succeeding.
/// - Rows are never updated (append-only, enforced by permissions).
async fn init_versions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing versions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS versions SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete FULL;

        DEFINE INDEX IF NOT EXISTS idx_version_number ON TABLE versions COLUMNS version_number UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_content_digest ON TABLE versions COLUMNS content_digest;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

    debug!("versions table initialized");
    Ok(())
}
