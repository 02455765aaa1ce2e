use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::Response;
use serde::Deserialize;
use tracing::debug;
use tracing::trace;

use super::KvStore;
use super::StoreLeaf;
use super::StoreResponse;
use super::StoreResult;
use crate::codec::normalize_path;
use crate::constants::ETCD_ERROR_EVENT_INDEX_CLEARED;
use crate::constants::ETCD_ERROR_KEY_NOT_FOUND;
use crate::constants::ETCD_INDEX_HEADER;
use crate::constants::ETCD_KEYS_API;
use crate::EtcdConfig;
use crate::StoreError;

/// etcd v2 keys API client
///
/// Reads are flattened to leaves (nodes without children), so an empty
/// directory shows up as a single valueless leaf.
#[derive(Debug, Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: Option<(String, Option<String>)>,
    request_timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
enum ResponseKind {
    Read,
    Watch,
}

#[derive(Debug, Deserialize)]
struct EtcdResponseBody {
    #[allow(dead_code)]
    action: String,
    node: Option<EtcdNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdNode {
    key: Option<String>,
    value: Option<String>,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
    #[serde(default)]
    modified_index: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdErrorBody {
    error_code: u32,
    message: String,
    #[serde(default)]
    cause: String,
    #[serde(default)]
    index: u64,
}

impl EtcdClient {
    pub fn new(config: &EtcdConfig) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn key_url(
        &self,
        path: &str,
    ) -> String {
        format!("{}/{}{}", self.endpoint, ETCD_KEYS_API, normalize_path(path))
    }

    fn request(
        &self,
        method: Method,
        path: &str,
    ) -> RequestBuilder {
        let builder = self.http.request(method, self.key_url(path));
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_ref()),
            None => builder,
        }
    }

    async fn send(
        &self,
        path: &str,
        builder: RequestBuilder,
        timeout: Duration,
    ) -> StoreResult<Response> {
        builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(path, timeout, e))
    }

    /// For reads the index is the larger of `X-Etcd-Index` and the newest
    /// node. A watch answer is indexed by its event only: the header holds
    /// the store index at the time the watch began, which is past any
    /// replayed event.
    async fn into_store_response(
        path: &str,
        response: Response,
        timeout: Duration,
        kind: ResponseKind,
    ) -> StoreResult<StoreResponse> {
        let status = response.status();
        let header_index = response
            .headers()
            .get(ETCD_INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(path, timeout, e))?;

        if !status.is_success() {
            return Err(api_error(path, status, &body));
        }
        // etcd closes an expired wait without a body
        if body.is_empty() {
            return Err(StoreError::Timeout {
                path: path.to_string(),
                duration: timeout,
            });
        }

        let parsed: EtcdResponseBody =
            serde_json::from_slice(&body).map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        let mut leaves = Vec::new();
        let mut max_modified = 0;
        if let Some(node) = parsed.node {
            collect_leaves(node, &mut leaves, &mut max_modified);
        }
        trace!(path, header_index, max_modified, leaves = leaves.len(), "etcd response");

        let index = match kind {
            ResponseKind::Watch if max_modified > 0 => max_modified,
            _ => header_index.max(max_modified),
        };
        Ok(StoreResponse { index, leaves })
    }
}

#[async_trait]
impl KvStore for EtcdClient {
    async fn read(
        &self,
        path: &str,
        recursive: bool,
    ) -> StoreResult<StoreResponse> {
        let builder = self
            .request(Method::GET, path)
            .query(&[("recursive", recursive.to_string())]);
        let response = self.send(path, builder, self.request_timeout).await?;
        Self::into_store_response(path, response, self.request_timeout, ResponseKind::Read).await
    }

    async fn watch(
        &self,
        path: &str,
        index: u64,
        recursive: bool,
        timeout: Duration,
    ) -> StoreResult<StoreResponse> {
        debug!(path, index, "long polling");
        let builder = self.request(Method::GET, path).query(&[
            ("wait", "true".to_string()),
            ("waitIndex", index.to_string()),
            ("recursive", recursive.to_string()),
        ]);
        let response = self.send(path, builder, timeout).await?;
        Self::into_store_response(path, response, timeout, ResponseKind::Watch).await
    }

    async fn write(
        &self,
        path: &str,
        value: &str,
    ) -> StoreResult<()> {
        let builder = self.request(Method::PUT, path).form(&[("value", value)]);
        let response = self.send(path, builder, self.request_timeout).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(path, self.request_timeout, e))?;
        Err(api_error(path, status, &body))
    }
}

fn collect_leaves(
    node: EtcdNode,
    leaves: &mut Vec<StoreLeaf>,
    max_modified: &mut u64,
) {
    *max_modified = (*max_modified).max(node.modified_index);
    if node.nodes.is_empty() {
        leaves.push(StoreLeaf {
            key: node.key.unwrap_or_default(),
            value: node.value,
        });
    } else {
        for child in node.nodes {
            collect_leaves(child, leaves, max_modified);
        }
    }
}

fn classify_transport_error(
    path: &str,
    timeout: Duration,
    e: reqwest::Error,
) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout {
            path: path.to_string(),
            duration: timeout,
        }
    } else if e.is_connect() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Http(e)
    }
}

fn api_error(
    path: &str,
    status: reqwest::StatusCode,
    body: &[u8],
) -> StoreError {
    match serde_json::from_slice::<EtcdErrorBody>(body) {
        Ok(err) if err.error_code == ETCD_ERROR_KEY_NOT_FOUND => {
            let key = if err.cause.is_empty() { path.to_string() } else { err.cause };
            StoreError::KeyNotFound(key)
        }
        Ok(err) if err.error_code == ETCD_ERROR_EVENT_INDEX_CLEARED => StoreError::IndexCleared { index: err.index },
        Ok(err) => StoreError::Api {
            code: err.error_code,
            message: err.message,
            cause: err.cause,
        },
        Err(_) => StoreError::InvalidResponse(format!(
            "HTTP {} for '{}': {}",
            status,
            path,
            String::from_utf8_lossy(body)
        )),
    }
}
