//! Collection sync
//!
//! ## Workflows
//!
//! - `SyncEngine::import`: mirror a collection for the first time
//! - `SyncEngine::refresh`: rewrite stale records, flag removed ones
//!
//! Both regenerate the collection's view descriptor and report progress
//! through a `ProgressSink`.

mod engine;
mod error;
mod report;
mod view;
mod writer;

pub use engine::SyncEngine;
pub use error::SyncError;
pub use report::{ProgressSink, SyncProgress, SyncResult};
pub use view::{view_path, Filters, TableView, ViewDescriptor, VIEW_EXTENSION};
pub use writer::{sanitize_file_name, RecordWriter, WriteOutcome};
