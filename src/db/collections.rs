use chrono::Utc;
use rusqlite::params;

use super::*;

impl CollectionDb {
    // =========================================================================
    // Collection documents
    // =========================================================================

    /// Get the raw JSON document stored under `key`.
    pub fn get_document(&self, key: &str) -> Result<Option<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM collections WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the document stored under `key`.
    pub fn put_document(&self, key: &str, value: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO collections (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Delete the document stored under `key`. Returns whether a row was removed.
    pub fn delete_document(&self, key: &str) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM collections WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    /// Whether a document exists under `key`.
    pub fn has_document(&self, key: &str) -> Result<bool, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM collections WHERE key = ?1")?;
        Ok(stmt.exists(params![key])?)
    }
}
