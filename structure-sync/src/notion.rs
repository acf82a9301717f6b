#![doc = "Notion block API client: implements the core `BlockStore` contract over HTTP."]
//
//! # Notion client (CLI <-> Core)
//!
//! Bridges [`structure_sync_core::contract::BlockStore`] to the hosted Notion
//! REST API. The core crate only knows about blocks and children; this module
//! owns URLs, authentication, the API version header, and retries.
//!
//! ## Endpoints
//! - `GET   /v1/blocks/{id}/children?start_cursor=..&page_size=100`
//! - `PATCH /v1/blocks/{id}/children` with `{"children": [...]}`
//! - `PATCH /v1/blocks/{id}` with `{"<type>": {...}}`
//!
//! ## Retries
//! Reads and block updates are retried on connect errors, timeouts, `429` and
//! `5xx`, up to [`MAX_ATTEMPTS`] times with exponential backoff. Appends are
//! not idempotent: they are only retried on `429` or when the connection
//! failed before the request went out. A numeric `Retry-After` header
//! replaces the computed delay; every delay is capped at [`MAX_RETRY_DELAY`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use structure_sync_core::blocks::{Block, BlockContent, ChildrenPage};
use structure_sync_core::contract::{BlockStore, StoreError};

pub const NOTION_VERSION: &str = "2022-06-28";
pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 100;

#[derive(Debug, serde::Deserialize)]
struct AppendResponse {
    #[serde(default)]
    results: Vec<Block>,
}

pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    initial_backoff: Duration,
}

impl NotionClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            StoreError::Transport {
                endpoint: base_url.to_string(),
                message: format!("invalid API key header: {e}"),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Transport {
                endpoint: base_url.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(base_url, notion_version = NOTION_VERSION, "Initialized NotionClient");
        Ok(NotionClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Overrides the first retry delay.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/v1/{}", self.base_url, endpoint)
    }

    async fn send<T>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        replay: Replay,
    ) -> Result<T, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut attempt = 1;
        loop {
            match self.send_once(method.clone(), endpoint, query, body).await {
                Ok(text) => {
                    return serde_json::from_str(&text).map_err(|e| {
                        tracing::error!(error = %e, endpoint, "Failed to decode response");
                        StoreError::Decode {
                            endpoint: endpoint.to_string(),
                            message: e.to_string(),
                        }
                    });
                }
                Err(failure) if attempt < MAX_ATTEMPTS && may_retry(replay, &failure) => {
                    let delay = retry_delay(self.initial_backoff, attempt, failure.retry_after);
                    tracing::warn!(error = %failure.error, endpoint, attempt, delay_ms = delay.as_millis() as u64, "Transient API failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    tracing::error!(error = %failure.error, endpoint, attempt, ?replay, "API request failed");
                    return Err(failure.error);
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, Failure> {
        let mut request = self.http.request(method, self.url(endpoint)).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        let transport = |e: reqwest::Error, request_sent: bool| Failure {
            error: StoreError::Transport {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            },
            retry_after: None,
            request_sent,
        };
        let response = request.send().await.map_err(|e| {
            let request_sent = !(e.is_connect() || e.is_builder());
            transport(e, request_sent)
        })?;
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.map_err(|e| transport(e, true))?;
        if status.is_success() {
            return Ok(text);
        }
        Err(Failure {
            error: api_error(endpoint, status, text),
            retry_after,
            request_sent: true,
        })
    }
}

/// Whether a request may be sent again after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Reads and whole-block updates; repeating them changes nothing.
    Safe,
    /// Appends; repeated only when the server cannot have applied the first attempt.
    Unapplied,
}

/// One failed attempt.
#[derive(Debug)]
pub struct Failure {
    pub error: StoreError,
    pub retry_after: Option<Duration>,
    /// `false` when the connection failed before any bytes were written.
    pub request_sent: bool,
}

/// Retry decision for `failure` under `replay`.
pub fn may_retry(replay: Replay, failure: &Failure) -> bool {
    if !failure.error.is_transient() {
        return false;
    }
    match replay {
        Replay::Safe => true,
        Replay::Unapplied => match &failure.error {
            StoreError::Api { status, .. } => *status == 429,
            StoreError::Transport { .. } => !failure.request_sent,
            StoreError::Decode { .. } => false,
        },
    }
}

fn api_error(endpoint: &str, status: StatusCode, body: String) -> StoreError {
    StoreError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    }
}

/// Delay before retry number `attempt`: the server's `Retry-After` if given,
/// otherwise exponential backoff, never more than [`MAX_RETRY_DELAY`].
pub fn retry_delay(initial: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    retry_after
        .unwrap_or_else(|| backoff(initial, attempt))
        .min(MAX_RETRY_DELAY)
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Delay requested by a numeric `Retry-After` header.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Request body for `PATCH /v1/blocks/{id}/children`.
pub fn append_body(children: &[BlockContent]) -> Value {
    json!({ "children": children })
}

/// Request body for `PATCH /v1/blocks/{id}`; the API rejects the `type` key
/// on updates.
pub fn update_body(content: &BlockContent) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(content)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("type");
    }
    Ok(value)
}

#[async_trait]
impl BlockStore for NotionClient {
    async fn list_children(
        &self,
        block_id: &str,
        start_cursor: Option<String>,
    ) -> Result<ChildrenPage, StoreError> {
        let endpoint = format!("blocks/{block_id}/children");
        let mut query = vec![("page_size", PAGE_SIZE.to_string())];
        if let Some(cursor) = start_cursor {
            query.push(("start_cursor", cursor));
        }
        tracing::debug!(block_id, "Listing block children");
        self.send(Method::GET, &endpoint, &query, None, Replay::Safe).await
    }

    async fn append_children(
        &self,
        parent_id: &str,
        children: Vec<BlockContent>,
    ) -> Result<Vec<Block>, StoreError> {
        let endpoint = format!("blocks/{parent_id}/children");
        tracing::info!(parent_id, count = children.len(), "Appending blocks");
        let body = append_body(&children);
        let response: AppendResponse = self
            .send(Method::PATCH, &endpoint, &[], Some(&body), Replay::Unapplied)
            .await?;
        Ok(response.results)
    }

    async fn update_block(
        &self,
        block_id: &str,
        content: BlockContent,
    ) -> Result<Block, StoreError> {
        let endpoint = format!("blocks/{block_id}");
        tracing::info!(block_id, "Updating block");
        let body = update_body(&content).map_err(|e| StoreError::Decode {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;
        self.send(Method::PATCH, &endpoint, &[], Some(&body), Replay::Safe)
            .await
    }
}
