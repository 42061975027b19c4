//! Quill Core Library
//!
//! This crate mirrors a remote collection of pages (a Notion-style
//! database) into a folder of markdown files with YAML front matter, and
//! keeps that folder current on later refreshes.
//!
//! # Architecture
//!
//! - **Remote**: paced, retrying access to the collection API
//! - **Markup**: page content trees rendered as markdown
//! - **Store**: the local record files and their front-matter index
//! - **Sync**: import and refresh runs tying the three together
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let fetcher = Fetcher::new(
//!     HttpApi::new(config.http_config()?)?,
//!     RemoteClient::new(config.retry_policy()),
//! );
//! let engine = SyncEngine::new(fetcher, FsStore::new(&config.vault_dir), &config.sync_folder);
//!
//! let id = CollectionId::parse("https://www.notion.so/Tasks-0123456789abcdef0123456789abcdef")?;
//! let result = engine.import(&id, ProgressSink::none()).await?;
//! ```
//!
//! # Modules
//!
//! - `ids`: collection identifier parsing
//! - `models`: schema, rows and property values
//! - `content`: page content nodes and inline runs
//! - `remote`: API seam, HTTP client, pacing and pagination
//! - `markup`: content tree converter
//! - `store`: record store trait, disk and in-memory stores
//! - `sync`: import/refresh engine, view descriptors, progress
//! - `config`: application configuration

pub mod config;
pub mod content;
pub mod ids;
pub mod markup;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use content::{ContentNode, InlineRun, NodeKind};
pub use ids::{CollectionId, IdError};
pub use markup::{Converter, RenderContext};
pub use models::{CollectionSchema, Column, ColumnType, PropertyValue, RemoteRecord};
pub use remote::{Fetcher, HttpApi, HttpApiConfig, RemoteApi, RemoteClient, RemoteError, RetryPolicy};
pub use store::{FsStore, LocalRecord, MemoryStore, RecordStore, StoreError};
pub use sync::{ProgressSink, SyncEngine, SyncError, SyncProgress, SyncResult};
