//! HTTP implementation of the remote API
//!
//! Talks to a Notion-style REST endpoint:
//!
//! - `GET  {base}/databases/{id}` for the schema
//! - `POST {base}/databases/{id}/query` for rows
//! - `GET  {base}/blocks/{id}/children` for content nodes

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::api::{Page, RemoteApi};
use super::error::{RemoteError, RemoteResult};
use super::wire;
use crate::content::ContentNode;
use crate::ids::CollectionId;
use crate::models::{CollectionSchema, RemoteRecord};

/// Request timeout in seconds
const REQUEST_TIMEOUT: u64 = 30;

/// Header carrying the API version
const VERSION_HEADER: &str = "Notion-Version";

/// Connection settings for `HttpApi`
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    pub base_url: String,
    pub token: String,
    pub api_version: String,
}

/// Remote API over HTTPS
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: Client,
    base_url: String,
    token: String,
    api_version: String,
}

impl HttpApi {
    pub fn new(config: HttpApiConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            api_version: config.api_version,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(VERSION_HEADER, &self.api_version)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Value> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        debug!("Remote responded {}", status);

        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(error_from_response(response).await)
    }
}

/// Error object returned with non-success statuses
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

async fn error_from_response(response: Response) -> RemoteError {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    status_error(status, retry_after, &body)
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> RemoteError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "unknown error".to_string());

    RemoteError::Status {
        status: status.as_u16(),
        code: parsed.code,
        message,
        retry_after,
    }
}

/// `Retry-After` given in (possibly fractional) seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

fn page_query(cursor: Option<&str>, page_size: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![("page_size", page_size.to_string())];
    if let Some(cursor) = cursor {
        query.push(("start_cursor", cursor.to_string()));
    }
    query
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn retrieve_collection(&self, id: &CollectionId) -> RemoteResult<CollectionSchema> {
        let request = self.http.get(self.url(&format!("databases/{id}")));
        wire::decode_schema(self.send(request).await?)
    }

    async fn query_collection(
        &self,
        id: &CollectionId,
        cursor: Option<&str>,
        page_size: u32,
    ) -> RemoteResult<Page<RemoteRecord>> {
        let mut body = serde_json::json!({ "page_size": page_size });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor.to_string());
        }

        let request = self
            .http
            .post(self.url(&format!("databases/{id}/query")))
            .json(&body);
        wire::decode_records_page(self.send(request).await?)
    }

    async fn list_children(
        &self,
        node_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> RemoteResult<Page<ContentNode>> {
        let request = self
            .http
            .get(self.url(&format!("blocks/{node_id}/children")))
            .query(&page_query(cursor, page_size));
        wire::decode_children_page(self.send(request).await?)
    }
}
