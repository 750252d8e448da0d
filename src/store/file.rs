//! Directory backend: `<dir>/<storage key>.json` per collection.
//!
//! Writes land in a temp file in the same directory and are renamed over the
//! target, so a reader sees either the old document or the new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{Collection, CollectionStore, StoreError};

pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Use `dir` as the data directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.storage_key()))
    }
}

impl CollectionStore for FileStore {
    fn read(&self, collection: Collection) -> Result<Option<String>, StoreError> {
        let path = self.path_for(collection);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, collection: Collection, document: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(document.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(collection))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn delete(&self, collection: Collection) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.path_for(collection)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.path_for(collection).exists())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
