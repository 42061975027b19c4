//! In-memory record store

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::error::{StoreError, StoreResult};
use super::{collect_member, LocalRecord, RecordStore};
use crate::ids::CollectionId;

#[derive(Debug, Default)]
struct Contents {
    files: BTreeMap<PathBuf, String>,
    folders: BTreeSet<PathBuf>,
}

/// Record store holding files in a map
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: Mutex<Contents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every stored file, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Contents> {
        self.contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordStore for MemoryStore {
    fn records_in_collection(&self, collection: &CollectionId) -> StoreResult<Vec<LocalRecord>> {
        let contents = self.lock();
        let mut found = Vec::new();
        for (path, text) in &contents.files {
            if path.extension().is_some_and(|ext| ext == "md") {
                collect_member(path, text, collection, &mut found);
            }
        }
        Ok(found)
    }

    fn create_folder(&self, path: &Path) -> StoreResult<()> {
        let mut contents = self.lock();
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                contents.folders.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let contents = self.lock();
        contents.files.contains_key(path) || contents.folders.contains(path)
    }

    fn read(&self, path: &Path) -> StoreResult<String> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write(&self, path: &Path, contents: &str) -> StoreResult<()> {
        self.lock()
            .files
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeApi;

    #[test]
    fn test_write_read_exists() {
        let store = MemoryStore::new();
        let path = Path::new("Remote/Tasks/A.md");
        assert!(!store.exists(path));

        store.write(path, "text").unwrap();
        assert!(store.exists(path));
        assert_eq!(store.read(path).unwrap(), "text");
        assert!(matches!(
            store.read(Path::new("B.md")),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_folder_registers_ancestors() {
        let store = MemoryStore::new();
        store.create_folder(Path::new("Remote/Tasks")).unwrap();
        assert!(store.exists(Path::new("Remote")));
        assert!(store.exists(Path::new("Remote/Tasks")));
        assert!(store.paths().is_empty());
    }

    #[test]
    fn test_records_in_collection() {
        let store = MemoryStore::new();
        let id = FakeApi::collection_id();
        let header = format!("---\nremote-id: r1\ncollection-id: {id}\n---\n");

        store.write(Path::new("X/A.md"), &header).unwrap();
        store.write(Path::new("X/B.md"), "---\nremote-id: r2\n---\n").unwrap();
        store.write(Path::new("X/A.base"), &header).unwrap();

        let records = store.records_in_collection(&id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].remote_id, "r1");
    }
}
