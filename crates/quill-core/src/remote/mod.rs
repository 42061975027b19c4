//! Remote access layer
//!
//! - `api`: the `RemoteApi` seam, one method per request
//! - `http`: `reqwest` implementation against the REST endpoint
//! - `client`: spacing and retry around every request
//! - `fetch`: cursor walking on top of the client

pub mod api;
pub mod client;
pub mod clock;
pub mod error;
pub mod fetch;
pub mod http;
mod wire;

pub use api::{Page, RemoteApi};
pub use client::{RemoteClient, RetryPolicy};
pub use clock::{Clock, SystemClock};
pub use error::{RemoteError, RemoteResult};
pub use fetch::{Fetcher, PAGE_SIZE};
pub use http::{HttpApi, HttpApiConfig};
