//! Filesystem record store
//!
//! Records are markdown files under a vault directory. The collection
//! index is built by walking every `*.md` file and reading its front
//! matter; hidden files and folders are skipped.
//!
//! Writes are atomic (temp file, sync, rename) so a crash never leaves a
//! half-written record behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::{StoreError, StoreResult};
use super::{collect_member, LocalRecord, RecordStore};
use crate::ids::CollectionId;

/// Record store rooted at a vault directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn walk(
        &self,
        dir: &Path,
        collection: &CollectionId,
        found: &mut Vec<LocalRecord>,
    ) -> StoreResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::from_read(e, dir.to_path_buf())),
        };

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::from_read(e, dir.to_path_buf()))?;
            let path = entry.path();
            if is_hidden(&path) {
                continue;
            }

            let file_type = entry
                .file_type()
                .map_err(|e| StoreError::from_read(e, path.clone()))?;

            if file_type.is_dir() {
                self.walk(&path, collection, found)?;
            } else if file_type.is_file() && is_markdown(&path) {
                let text = match fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Skipping unreadable file {:?}: {}", path, e);
                        continue;
                    }
                };
                let relative = path.strip_prefix(&self.root).unwrap_or(&path);
                collect_member(relative, &text, collection, found);
            }
        }

        Ok(())
    }
}

impl RecordStore for FsStore {
    fn records_in_collection(&self, collection: &CollectionId) -> StoreResult<Vec<LocalRecord>> {
        let mut found = Vec::new();
        self.walk(&self.root, collection, &mut found)?;
        found.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            "Found {} local records of {} under {:?}",
            found.len(),
            collection,
            self.root
        );
        Ok(found)
    }

    fn create_folder(&self, path: &Path) -> StoreResult<()> {
        let full = self.resolve(path);
        fs::create_dir_all(&full).map_err(|source| StoreError::CreateFolder { path: full, source })
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn read(&self, path: &Path) -> StoreResult<String> {
        let full = self.resolve(path);
        fs::read_to_string(&full).map_err(|e| StoreError::from_read(e, full))
    }

    fn write(&self, path: &Path, contents: &str) -> StoreResult<()> {
        atomic_write(&self.resolve(path), contents.as_bytes())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Write data to a file atomically
///
/// 1. Write to a hidden temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateFolder {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file =
        File::create(&temp_path).map_err(|e| StoreError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StoreError::AtomicWriteFailed {
        from: temp_path,
        to: path.to_path_buf(),
        source,
    })
}
