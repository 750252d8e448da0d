//! In-process backend. Used by tests and by `storage: "memory"` runs.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Collection, CollectionStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<Collection, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionStore for MemoryStore {
    fn read(&self, collection: Collection) -> Result<Option<String>, StoreError> {
        Ok(self.docs.read().get(&collection).cloned())
    }

    fn write(&self, collection: Collection, document: &str) -> Result<(), StoreError> {
        self.docs.write().insert(collection, document.to_string());
        Ok(())
    }

    fn delete(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.docs.write().remove(&collection).is_some())
    }

    fn contains(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.docs.read().contains_key(&collection))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
