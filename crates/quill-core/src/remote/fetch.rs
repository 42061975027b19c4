//! Paginated fetcher
//!
//! Walks cursor-paginated listings to the end, one page per client call,
//! and hands back the complete ordered sequence.

use std::future::Future;

use tracing::{debug, warn};

use super::api::{Page, RemoteApi};
use super::client::RemoteClient;
use super::error::{RemoteError, RemoteResult};
use crate::content::ContentNode;
use crate::ids::CollectionId;
use crate::models::{CollectionSchema, RemoteRecord};

/// Items requested per page
pub const PAGE_SIZE: u32 = 100;

/// Exhaustive reads over a remote API, routed through one client
pub struct Fetcher<A> {
    api: A,
    client: RemoteClient,
}

impl<A: RemoteApi> Fetcher<A> {
    pub fn new(api: A, client: RemoteClient) -> Self {
        Self { api, client }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    /// Collection title and schema
    pub async fn collection(&self, id: &CollectionId) -> RemoteResult<CollectionSchema> {
        let api = &self.api;
        self.client.call(|| api.retrieve_collection(id)).await
    }

    /// Every row of a collection, in query order
    pub async fn records(&self, id: &CollectionId) -> RemoteResult<Vec<RemoteRecord>> {
        let api = &self.api;
        let records = self
            .paginate(move |cursor| async move {
                api.query_collection(id, cursor.as_deref(), PAGE_SIZE).await
            })
            .await?;
        debug!("Fetched {} rows of {}", records.len(), id);
        Ok(records)
    }

    /// Every direct child of a node, in document order
    pub async fn children(&self, node_id: &str) -> RemoteResult<Vec<ContentNode>> {
        let api = &self.api;
        self.paginate(move |cursor| async move {
            api.list_children(node_id, cursor.as_deref(), PAGE_SIZE).await
        })
        .await
    }

    /// Follow cursors until the remote reports no further page
    ///
    /// `next_page` is called with the cursor of the page to fetch, `None`
    /// for the first one. A cursor handed back twice in a row is reported
    /// as a decode error.
    pub async fn paginate<T, F, Fut>(&self, mut next_page: F) -> RemoteResult<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = RemoteResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .client
                .call(|| next_page(cursor.clone()))
                .await?;
            pages += 1;
            items.extend(page.items);

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    warn!("Remote repeated cursor {} after {} pages", next, pages);
                    return Err(RemoteError::Decode(format!(
                        "pagination cursor {next} did not advance"
                    )));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(items)
    }
}
