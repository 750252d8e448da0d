//! SQLite-backed key/value store for named collections.
//!
//! The database file lives in the configured data directory
//! (`~/.clientcore/clientcore.db` by default). Each collection (clients,
//! proposals, ...) is one row in the `collections` table holding the whole
//! JSON document, so a save is a single statement and readers never observe
//! half a collection.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod collections;
pub mod types;
pub use types::*;

pub struct CollectionDb {
    conn: Connection,
}

impl CollectionDb {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL keeps readers off the writer's lock
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        log::debug!("Opened collection database at {}", path.display());
        Ok(Self { conn })
    }
}

pub mod test_utils {
    use super::CollectionDb;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    /// Test temp dirs are cleaned up by the OS.
    pub fn test_db() -> CollectionDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        CollectionDb::open_at(path).expect("Failed to open test database")
    }
}

// =============================================================================
// Tests
// =============================================================================
