//! Persistence adapter over named collections.
//!
//! Every collection is stored as one JSON document under a fixed key
//! (`clientcore_clients`, `clientcore_proposals`, ...). Backends only move
//! whole documents; `Storage` layers typed load/save on top, swallows
//! unreadable documents (logged, treated as empty) and publishes a
//! `StoreEvent` after each successful write.
//!
//! Single records that don't decode are left out of `load`, but
//! `load_all` hands them back as raw JSON so a write can put them back
//! with `save_keeping` instead of erasing them.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::db::DbError;

pub mod events;
pub mod file;
pub mod memory;
pub mod sqlite;

pub use events::{ChangeFeed, ChangeKind, StoreEvent};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors raised by a storage backend while reading or writing a document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A named collection (or singleton document) in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    ProfileData,
    ProfilePicture,
    Notifications,
    Proposals,
    Projects,
    Clients,
    Tasks,
    Employees,
    Users,
    Token,
    User,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::ProfileData,
        Collection::ProfilePicture,
        Collection::Notifications,
        Collection::Proposals,
        Collection::Projects,
        Collection::Clients,
        Collection::Tasks,
        Collection::Employees,
        Collection::Users,
        Collection::Token,
        Collection::User,
    ];

    /// Short name, as used on the CLI and in events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ProfileData => "profile_data",
            Collection::ProfilePicture => "profile_picture",
            Collection::Notifications => "notifications",
            Collection::Proposals => "proposals",
            Collection::Projects => "projects",
            Collection::Clients => "clients",
            Collection::Tasks => "tasks",
            Collection::Employees => "employees",
            Collection::Users => "users",
            Collection::Token => "token",
            Collection::User => "user",
        }
    }

    /// Key the document is stored under in every backend.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Collection::ProfileData => "clientcore_profile_data",
            Collection::ProfilePicture => "clientcore_profile_picture",
            Collection::Notifications => "clientcore_notifications",
            Collection::Proposals => "clientcore_proposals",
            Collection::Projects => "clientcore_projects",
            Collection::Clients => "clientcore_clients",
            Collection::Tasks => "clientcore_tasks",
            Collection::Employees => "clientcore_employees",
            Collection::Users => "clientcore_users",
            Collection::Token => "clientcore_token",
            Collection::User => "clientcore_user",
        }
    }

    /// Parse a short name or a full storage key.
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim();
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted || c.storage_key() == wanted)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw persistence port. Implementations move whole documents only.
pub trait CollectionStore: Send + Sync {
    /// Read the document stored for `collection`, if any.
    fn read(&self, collection: Collection) -> Result<Option<String>, StoreError>;

    /// Overwrite the document for `collection` in a single write.
    fn write(&self, collection: Collection, document: &str) -> Result<(), StoreError>;

    /// Delete the document. Returns whether anything was removed.
    fn delete(&self, collection: Collection) -> Result<bool, StoreError>;

    fn contains(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.read(collection)?.is_some())
    }

    /// Human-readable backend label for logs.
    fn backend_name(&self) -> &'static str;
}

/// A record collection as loaded: the records that decoded, plus the stored
/// entries that didn't, kept verbatim.
#[derive(Debug, Clone)]
pub struct LoadedCollection<T> {
    pub records: Vec<T>,
    pub unreadable: Vec<serde_json::Value>,
}

impl<T> LoadedCollection<T> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

/// Typed access to the backend plus the change feed. Cheap to clone.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn CollectionStore>,
    feed: ChangeFeed,
}

impl Storage {
    pub fn new(backend: Arc<dyn CollectionStore>) -> Self {
        Self {
            backend,
            feed: ChangeFeed::new(),
        }
    }

    /// Storage over a fresh `MemoryStore`.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Subscribe to change events published after each write.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.feed.subscribe()
    }

    /// Load a record collection. Never fails: a missing, unreadable or
    /// malformed document yields an empty list, and records that don't
    /// parse are skipped.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        self.load_all(collection).records
    }

    /// Like `load`, but also returns the array entries that failed to decode.
    pub fn load_all<T: DeserializeOwned>(&self, collection: Collection) -> LoadedCollection<T> {
        let Some(raw) = self.read_or_log(collection) else {
            return LoadedCollection::empty();
        };

        let items = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(items)) => items,
            Ok(other) => {
                log::warn!(
                    "Collection {} is not an array (found {}), treating as empty",
                    collection,
                    json_kind(&other)
                );
                return LoadedCollection::empty();
            }
            Err(e) => {
                log::warn!(
                    "Failed to parse collection {}: {}. Treating as empty",
                    collection,
                    e
                );
                return LoadedCollection::empty();
            }
        };

        let mut loaded = LoadedCollection {
            records: Vec::with_capacity(items.len()),
            unreadable: Vec::new(),
        };
        for (index, item) in items.into_iter().enumerate() {
            match T::deserialize(&item) {
                Ok(record) => loaded.records.push(record),
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable record #{} in {}: {}",
                        index,
                        collection,
                        e
                    );
                    loaded.unreadable.push(item);
                }
            }
        }
        loaded
    }

    /// Overwrite a record collection and publish a change event.
    pub fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<(), StoreError> {
        let document = serde_json::to_string(records)?;
        self.backend.write(collection, &document)?;
        log::debug!("Saved {} record(s) to {}", records.len(), collection);
        self.feed
            .publish(StoreEvent::new(collection, ChangeKind::Saved, Some(records.len())));
        Ok(())
    }

    /// Save `records`, then append `unreadable` entries exactly as they were
    /// stored.
    pub fn save_keeping<T: Serialize>(
        &self,
        collection: Collection,
        records: &[T],
        unreadable: &[serde_json::Value],
    ) -> Result<(), StoreError> {
        if unreadable.is_empty() {
            return self.save(collection, records);
        }
        let mut items = Vec::with_capacity(records.len() + unreadable.len());
        for record in records {
            items.push(serde_json::to_value(record)?);
        }
        items.extend(unreadable.iter().cloned());
        log::warn!(
            "Keeping {} unreadable record(s) in {} as stored",
            unreadable.len(),
            collection
        );
        self.save(collection, &items)
    }

    /// Load a singleton JSON document (profile, notification settings).
    pub fn load_document<T: DeserializeOwned>(&self, collection: Collection) -> Option<T> {
        let raw = self.read_or_log(collection)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Failed to parse document {}: {}. Ignoring it", collection, e);
                None
            }
        }
    }

    /// Overwrite a singleton JSON document and publish a change event.
    pub fn save_document<T: Serialize>(&self, collection: Collection, value: &T) -> Result<(), StoreError> {
        let document = serde_json::to_string(value)?;
        self.backend.write(collection, &document)?;
        self.feed
            .publish(StoreEvent::new(collection, ChangeKind::Saved, None));
        Ok(())
    }

    /// Load an opaque string value (the profile picture data URL).
    pub fn load_raw(&self, collection: Collection) -> Option<String> {
        self.read_or_log(collection)
    }

    /// Store an opaque string value as-is.
    pub fn save_raw(&self, collection: Collection, value: &str) -> Result<(), StoreError> {
        self.backend.write(collection, value)?;
        self.feed
            .publish(StoreEvent::new(collection, ChangeKind::Saved, None));
        Ok(())
    }

    /// Delete a stored document entirely.
    pub fn remove(&self, collection: Collection) -> Result<bool, StoreError> {
        let removed = self.backend.delete(collection)?;
        if removed {
            self.feed
                .publish(StoreEvent::new(collection, ChangeKind::Removed, None));
        }
        Ok(removed)
    }

    /// Whether the backend holds a document for `collection`.
    pub fn contains(&self, collection: Collection) -> Result<bool, StoreError> {
        self.backend.contains(collection)
    }

    fn read_or_log(&self, collection: Collection) -> Option<String> {
        match self.backend.read(collection) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!(
                    "Failed to read {} from {} store: {}. Treating as empty",
                    collection,
                    self.backend.backend_name(),
                    e
                );
                None
            }
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: String,
        n: u32,
    }

    /// Backend whose reads always fail, to exercise the recovery path.
    struct BrokenStore;

    impl CollectionStore for BrokenStore {
        fn read(&self, _collection: Collection) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk on fire")))
        }
        fn write(&self, _collection: Collection, _document: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk on fire")))
        }
        fn delete(&self, _collection: Collection) -> Result<bool, StoreError> {
            Ok(false)
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn storage_with(collection: Collection, raw: &str) -> Storage {
        let backend = MemoryStore::new();
        backend.write(collection, raw).expect("seed raw");
        Storage::new(Arc::new(backend))
    }

    #[test]
    fn test_missing_collection_loads_empty() {
        let storage = Storage::in_memory();
        let rows: Vec<Row> = storage.load(Collection::Clients);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_corrupt_collection_loads_empty() {
        let storage = storage_with(Collection::Clients, "{not json");
        let rows: Vec<Row> = storage.load(Collection::Clients);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_non_array_collection_loads_empty() {
        let storage = storage_with(Collection::Clients, r#"{"id":"1"}"#);
        let rows: Vec<Row> = storage.load(Collection::Clients);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let raw = json!([{"id": "1", "n": 1}, {"id": 5}, {"id": "3", "n": 3}]).to_string();
        let storage = storage_with(Collection::Tasks, &raw);
        let rows: Vec<Row> = storage.load(Collection::Tasks);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_unreadable_records_survive_a_keeping_save() {
        let raw = json!([{"id": "1", "n": 1}, {"id": "2", "n": "many"}]).to_string();
        let storage = storage_with(Collection::Tasks, &raw);

        let mut loaded: LoadedCollection<Row> = storage.load_all(Collection::Tasks);
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.unreadable, vec![json!({"id": "2", "n": "many"})]);

        loaded.records.push(Row { id: "3".into(), n: 3 });
        storage
            .save_keeping(Collection::Tasks, &loaded.records, &loaded.unreadable)
            .expect("save");

        let stored: Vec<serde_json::Value> = storage.load(Collection::Tasks);
        let ids: Vec<&str> = stored.iter().filter_map(|v| v["id"].as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "2"]);
        assert_eq!(stored[2]["n"], "many");
    }

    #[test]
    fn test_read_failure_loads_empty_and_write_failure_propagates() {
        let storage = Storage::new(Arc::new(BrokenStore));
        let rows: Vec<Row> = storage.load(Collection::Clients);
        assert!(rows.is_empty());
        let rows = vec![Row { id: "1".into(), n: 1 }];
        assert!(storage.save(Collection::Clients, &rows).is_err());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let storage = Storage::in_memory();
        let rows = vec![Row { id: "a".into(), n: 1 }, Row { id: "b".into(), n: 2 }];
        storage.save(Collection::Projects, &rows).expect("save");
        let loaded: Vec<Row> = storage.load(Collection::Projects);
        assert_eq!(loaded, rows);
        assert!(storage.contains(Collection::Projects).expect("contains"));
    }

    #[test]
    fn test_save_publishes_event() {
        let storage = Storage::in_memory();
        let mut rx = storage.subscribe();
        storage
            .save(Collection::Tasks, &[Row { id: "1".into(), n: 0 }])
            .expect("save");
        let event = rx.try_recv().expect("event published");
        assert_eq!(event.collection, Collection::Tasks);
        assert_eq!(event.kind, ChangeKind::Saved);
        assert_eq!(event.records, Some(1));
    }

    #[test]
    fn test_remove_publishes_only_when_something_was_removed() {
        let storage = Storage::in_memory();
        let mut rx = storage.subscribe();
        assert!(!storage.remove(Collection::User).expect("remove"));
        assert!(rx.try_recv().is_err());

        storage.save_raw(Collection::ProfilePicture, "data:image/png;base64,AAAA").expect("save");
        assert!(storage.remove(Collection::ProfilePicture).expect("remove"));
        let first = rx.try_recv().expect("save event");
        let second = rx.try_recv().expect("remove event");
        assert_eq!(first.kind, ChangeKind::Saved);
        assert_eq!(second.kind, ChangeKind::Removed);
    }

    #[test]
    fn test_collection_parse_accepts_names_and_keys() {
        assert_eq!(Collection::parse("clients"), Some(Collection::Clients));
        assert_eq!(
            Collection::parse("clientcore_proposals"),
            Some(Collection::Proposals)
        );
        assert_eq!(Collection::parse("invoices"), None);
    }
}
