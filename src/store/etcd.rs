//! # etcd v2 keys API client.
//!
//! Talks plain HTTP/JSON to an etcd cluster:
//! ```text
//! get:   GET {endpoint}/v2/keys{namespace}
//! watch: GET {endpoint}/v2/keys{namespace}?wait=true&recursive=true
//! ```
//!
//! Endpoints are tried in configuration order. An endpoint that fails at the
//! transport level, or answers with something mapped to `Unreachable`, is
//! skipped; only when every endpoint is skipped is the call reported as
//! [`StoreError::Unreachable`].
//!
//! ## Error mapping
//! - transport failure on all endpoints, 5xx without an etcd body,
//!   etcd `3xx` cluster codes → `Unreachable`
//! - etcd code `100` → `KeyNotFound`
//! - anything else (unknown code, undecodable body) → `Unrecognized`

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{
    error::StoreError,
    store::client::{KvStore, Node},
};

/// etcd error code for a missing key.
const ERR_KEY_NOT_FOUND: u32 = 100;

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: EtcdNode,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
}

impl From<EtcdNode> for Node {
    fn from(n: EtcdNode) -> Self {
        Node {
            key: n.key,
            value: n.value.unwrap_or_default(),
            dir: n.dir,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EtcdErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u32,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

impl EtcdErrorBody {
    fn into_store_error(self, key: &str) -> StoreError {
        match self.error_code {
            ERR_KEY_NOT_FOUND => StoreError::KeyNotFound {
                key: self.cause.unwrap_or_else(|| key.to_string()),
            },
            300..=399 => StoreError::Unreachable {
                error: format!("etcd {}: {}", self.error_code, self.message),
            },
            code => StoreError::Unrecognized {
                error: format!("etcd {code}: {}", self.message),
            },
        }
    }
}

/// etcd v2 client over a list of endpoints.
#[derive(Clone, Debug)]
pub struct EtcdClient {
    endpoints: Vec<String>,
    http: reqwest::Client,
    /// Separate client without a request timeout: watches are long polls.
    watch_http: reqwest::Client,
}

impl EtcdClient {
    /// Creates a client for the given endpoints (e.g. `http://127.0.0.1:4001`).
    pub fn new(endpoints: Vec<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let watch_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoints: endpoints
                .into_iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            http,
            watch_http,
        }
    }

    /// Configured endpoints, normalized without a trailing slash.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn keys_url(endpoint: &str, namespace: &str) -> String {
        if namespace.starts_with('/') {
            format!("{endpoint}/v2/keys{namespace}")
        } else {
            format!("{endpoint}/v2/keys/{namespace}")
        }
    }

    /// Sends the request to each endpoint in turn until one answers.
    async fn request(
        &self,
        client: &reqwest::Client,
        namespace: &str,
        query: &[(&str, &str)],
    ) -> Result<EtcdResponse, StoreError> {
        let mut last = String::from("no endpoints configured");

        for endpoint in &self.endpoints {
            let url = Self::keys_url(endpoint, namespace);
            let resp = match client.get(&url).query(query).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "etcd endpoint failed");
                    last = format!("{endpoint}: {e}");
                    continue;
                }
            };
            // An unhealthy member answers too; only a usable answer ends the loop.
            match Self::decode(resp, namespace).await {
                Err(StoreError::Unreachable { error }) => {
                    tracing::debug!(endpoint = %endpoint, error = %error, "etcd endpoint unavailable");
                    last = format!("{endpoint}: {error}");
                }
                res => return res,
            }
        }

        Err(StoreError::Unreachable { error: last })
    }

    async fn decode(resp: reqwest::Response, namespace: &str) -> Result<EtcdResponse, StoreError> {
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| StoreError::Unreachable {
            error: format!("reading response: {e}"),
        })?;

        if status.is_success() {
            return serde_json::from_slice::<EtcdResponse>(&body).map_err(|e| {
                StoreError::Unrecognized {
                    error: format!("decoding response: {e}"),
                }
            });
        }

        match serde_json::from_slice::<EtcdErrorBody>(&body) {
            Ok(err) => Err(err.into_store_error(namespace)),
            Err(_) if status.is_server_error() => Err(StoreError::Unreachable {
                error: format!("http {status}"),
            }),
            Err(_) => Err(StoreError::Unrecognized {
                error: format!("http {status}"),
            }),
        }
    }
}

#[async_trait]
impl KvStore for EtcdClient {
    async fn get(&self, namespace: &str) -> Result<Vec<Node>, StoreError> {
        let resp = self.request(&self.http, namespace, &[]).await?;
        Ok(resp.node.nodes.into_iter().map(Node::from).collect())
    }

    async fn watch(&self, namespace: &str, cancel: &CancellationToken) -> Result<Node, StoreError> {
        let query = [("wait", "true"), ("recursive", "true")];
        tokio::select! {
            res = self.request(&self.watch_http, namespace, &query) => res.map(|r| Node::from(r.node)),
            _ = cancel.cancelled() => Err(StoreError::Unreachable { error: "watch cancelled".into() }),
        }
    }
}
