use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

/// Table used when no collection name is given.
pub const DEFAULT_COLLECTION: &str = "cloudimagemetadata";

/// Collection names become table names, so they are restricted to plain
/// SQL identifiers.
pub fn validate_collection_name(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("sqlite_");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidCollectionName(name.to_string()))
    }
}

pub fn init_schema(conn: &Connection, collection: &str) -> Result<(), StorageError> {
    validate_collection_name(collection)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(VERSION_SQL)?;
    conn.execute_batch(&collection_sql(collection))?;
    Ok(())
}

const VERSION_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());
";

fn collection_sql(table: &str) -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS {table} (
    doc_id TEXT PRIMARY KEY,
    model_uuid BLOB NOT NULL CHECK (length(model_uuid) = 16),
    stream TEXT NOT NULL,
    region TEXT NOT NULL,
    series TEXT NOT NULL,
    arch TEXT NOT NULL,
    virtual_type TEXT NOT NULL,
    root_storage_type TEXT NOT NULL,
    root_storage_size TEXT NOT NULL,
    image_id TEXT NOT NULL,
    revision INTEGER NOT NULL CHECK (revision >= 1)
);
CREATE INDEX IF NOT EXISTS idx_{table}_model ON {table} (model_uuid);
"
    )
}
