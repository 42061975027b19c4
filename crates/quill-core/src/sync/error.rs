//! Sync error handling
//!
//! `SyncError` covers failures that abort a whole run. Failures of a
//! single row are recorded in the run's `SyncResult` instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::{CollectionId, IdError};
use crate::remote::RemoteError;
use crate::store::StoreError;

/// Errors that abort an import or refresh
#[derive(Error, Debug)]
pub enum SyncError {
    /// The pasted id or URL could not be parsed
    #[error("Invalid collection identifier: {0}")]
    InvalidIdentifier(#[from] IdError),

    /// The remote does not know the collection
    #[error("Collection {id} was not found. Check the id and that it is shared with the integration.")]
    CollectionNotFound { id: String },

    /// The token may not read the collection
    #[error("Collection {id} is not accessible: {message}")]
    CollectionInaccessible { id: String, message: String },

    /// The collection has nothing to mirror
    #[error("Collection {id} has no usable schema: {reason}")]
    NoSchema { id: String, reason: String },

    /// A fresh import was requested for an already mirrored collection
    #[error("Collection {collection_id} is already synced into '{folder}'. Use refresh instead.")]
    AlreadySynced {
        collection_id: String,
        folder: PathBuf,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Classify a remote failure raised while resolving a collection
    pub fn from_remote(id: &CollectionId, error: RemoteError) -> Self {
        match error.status_code() {
            Some(404) => SyncError::CollectionNotFound { id: id.to_string() },
            Some(401) | Some(403) => SyncError::CollectionInaccessible {
                id: id.to_string(),
                message: error.to_string(),
            },
            _ => SyncError::Remote(error),
        }
    }
}
