//! Paginated access to a log-indexing API.
//!
//! [`LogSource`] is the seam the harvester depends on. [`AnkrClient`] speaks
//! the `ankr_getLogs` JSON-RPC method, which pages through historical logs
//! with an opaque continuation token and returns ABI-decoded event inputs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::B256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::FetchError;

/// Filter for one pagination pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub blockchain: String,
    pub from_block: u64,
    pub to_block: u64,
    pub address: String,
    /// Per-position topic alternatives; an empty list matches anything.
    pub topics: Vec<Vec<B256>>,
    pub page_size: u32,
    pub decode_logs: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub value_decoded: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<EventInput>,
}

/// One log as returned by the API. Fields stay textual so a single malformed
/// log cannot fail the whole page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub event: Option<DecodedEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    #[serde(default)]
    pub logs: Vec<RawLog>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl LogPage {
    /// Continuation token, if the API reports more pages.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetches the page of `query` identified by `page_token` (`None` for the
    /// first page).
    async fn get_logs(
        &self,
        query: &LogQuery,
        page_token: Option<&str>,
    ) -> Result<LogPage, FetchError>;
}

#[async_trait]
impl<T: LogSource + ?Sized> LogSource for Arc<T> {
    async fn get_logs(
        &self,
        query: &LogQuery,
        page_token: Option<&str>,
    ) -> Result<LogPage, FetchError> {
        (**self).get_logs(query, page_token).await
    }
}

#[derive(Debug)]
pub struct AnkrClient {
    client: reqwest::Client,
    url: String,
    id: AtomicU64,
}

impl AnkrClient {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.id.fetch_add(1, Ordering::Relaxed)
    }

    fn request_body(&self, query: &LogQuery, page_token: Option<&str>) -> JsonValue {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GetLogsParams<'a> {
            #[serde(flatten)]
            query: &'a LogQuery,
            #[serde(skip_serializing_if = "Option::is_none")]
            page_token: Option<&'a str>,
        }

        serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": "ankr_getLogs",
            "params": GetLogsParams { query, page_token },
        })
    }
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<LogPage>,
    error: Option<RpcError>,
}

#[async_trait]
impl LogSource for AnkrClient {
    async fn get_logs(
        &self,
        query: &LogQuery,
        page_token: Option<&str>,
    ) -> Result<LogPage, FetchError> {
        let req = self.request_body(query, page_token);

        let response = self.client.post(&self.url).json(&req).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        let body = response
            .json::<RpcResponse>()
            .await
            .map_err(|e| FetchError::Transient(format!("malformed response: {e}")))?;
        match body {
            RpcResponse {
                error: Some(err), ..
            } => Err(FetchError::from_rpc(err.code, err.message)),
            RpcResponse {
                result: Some(page),
                ..
            } => Ok(page),
            RpcResponse { .. } => Err(FetchError::Transient(
                "response has neither result nor error".to_string(),
            )),
        }
    }
}
