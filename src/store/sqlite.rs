//! SQLite backend: one row per collection in `CollectionDb`.

use std::path::PathBuf;

use parking_lot::Mutex;

use super::{Collection, CollectionStore, StoreError};
use crate::db::CollectionDb;

pub struct SqliteStore {
    /// `rusqlite::Connection` is Send but not Sync; the mutex makes the
    /// backend shareable and keeps each write a single statement.
    db: Mutex<CollectionDb>,
}

impl SqliteStore {
    pub fn new(db: CollectionDb) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open (or create) the database file at `path`.
    pub fn open_at(path: PathBuf) -> Result<Self, StoreError> {
        Ok(Self::new(CollectionDb::open_at(path)?))
    }
}

impl CollectionStore for SqliteStore {
    fn read(&self, collection: Collection) -> Result<Option<String>, StoreError> {
        Ok(self.db.lock().get_document(collection.storage_key())?)
    }

    fn write(&self, collection: Collection, document: &str) -> Result<(), StoreError> {
        Ok(self
            .db
            .lock()
            .put_document(collection.storage_key(), document)?)
    }

    fn delete(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.db.lock().delete_document(collection.storage_key())?)
    }

    fn contains(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.db.lock().has_document(collection.storage_key())?)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
