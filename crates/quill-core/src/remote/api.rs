//! Remote API seam
//!
//! One method per remote request. Implementations do no throttling,
//! retrying or page walking; the client and fetcher layer that on top.

use async_trait::async_trait;

use super::error::RemoteResult;
use crate::content::ContentNode;
use crate::ids::CollectionId;
use crate::models::{CollectionSchema, RemoteRecord};

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page; `None` on the last page
    pub next_cursor: Option<String>,
}

/// Raw requests against the remote content store
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch a collection's title and column schema
    async fn retrieve_collection(&self, id: &CollectionId) -> RemoteResult<CollectionSchema>;

    /// Fetch one page of a collection's rows
    async fn query_collection(
        &self,
        id: &CollectionId,
        cursor: Option<&str>,
        page_size: u32,
    ) -> RemoteResult<Page<RemoteRecord>>;

    /// Fetch one page of a node's (or record's) direct children
    async fn list_children(
        &self,
        node_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> RemoteResult<Page<ContentNode>>;
}
