//! Local record store
//!
//! The narrow interface the sync engine needs from the host: create
//! folders, read and write files, and find the records that belong to a
//! collection by their front matter.
//!
//! ## Implementations
//!
//! - **FsStore**: a vault directory on disk
//! - **MemoryStore**: an in-process map, for tests and dry runs
//!
//! All paths handed to a store are relative to its root.

pub mod error;
pub mod frontmatter;
pub mod fs;
pub mod memory;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ids::CollectionId;

pub use error::{StoreError, StoreResult};
pub use frontmatter::FrontMatterDoc;
pub use fs::FsStore;
pub use memory::MemoryStore;

/// Front matter keys written by the mirror
pub mod keys {
    pub const REMOTE_ID: &str = "remote-id";
    pub const REMOTE_URL: &str = "remote-url";
    pub const FROZEN_AT: &str = "frozen-at";
    pub const LAST_EDITED: &str = "last-edited";
    pub const COLLECTION_ID: &str = "collection-id";
    pub const DELETED: &str = "deleted";

    /// Keys the mirror owns; a column with one of these names is skipped
    pub const RESERVED: [&str; 6] = [
        REMOTE_ID,
        REMOTE_URL,
        FROZEN_AT,
        LAST_EDITED,
        COLLECTION_ID,
        DELETED,
    ];
}

/// A mirrored record as found in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub path: PathBuf,
    pub remote_id: String,
    pub last_edited: Option<String>,
    pub collection_id: Option<String>,
    pub deleted: bool,
}

impl LocalRecord {
    /// Read the mirror keys of a parsed file; `None` if it has no remote id
    pub fn from_doc(path: &Path, doc: &FrontMatterDoc) -> Option<Self> {
        let remote_id = doc.get_str(keys::REMOTE_ID)?.trim();
        if remote_id.is_empty() {
            return None;
        }

        Some(Self {
            path: path.to_path_buf(),
            remote_id: remote_id.to_string(),
            last_edited: doc.get_str(keys::LAST_EDITED).map(str::to_string),
            collection_id: doc.get_str(keys::COLLECTION_ID).map(str::to_string),
            deleted: doc.get_bool(keys::DELETED).unwrap_or(false),
        })
    }

    pub fn belongs_to(&self, collection: &CollectionId) -> bool {
        self.collection_id.as_deref() == Some(collection.as_str())
    }
}

/// Host file and metadata store
pub trait RecordStore: Send + Sync {
    /// Records whose `collection-id` marker equals `collection`
    ///
    /// Membership is decided by the marker alone, never by location.
    fn records_in_collection(&self, collection: &CollectionId) -> StoreResult<Vec<LocalRecord>>;

    /// Create a folder and any missing parents
    fn create_folder(&self, path: &Path) -> StoreResult<()>;

    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> StoreResult<String>;

    /// Create or replace a file
    fn write(&self, path: &Path, contents: &str) -> StoreResult<()>;
}

/// Parse a file's front matter and collect it if it is a member
fn collect_member(
    path: &Path,
    text: &str,
    collection: &CollectionId,
    into: &mut Vec<LocalRecord>,
) {
    match FrontMatterDoc::parse(text) {
        Ok(doc) => {
            if let Some(record) = LocalRecord::from_doc(path, &doc) {
                if record.belongs_to(collection) {
                    into.push(record);
                }
            }
        }
        Err(e) => tracing::debug!("Ignoring {:?}: unreadable front matter: {}", path, e),
    }
}
