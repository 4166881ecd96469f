//! # Store client contract.
//!
//! A [`KvStore`] exposes exactly the two operations the engine needs:
//! - [`KvStore::get`] lists the nodes directly under a namespace;
//! - [`KvStore::watch`] blocks until something under a namespace changes and
//!   returns that one node. Watches are single-shot and must be reissued.
//!
//! Implementations classify every failure into a [`StoreError`] variant.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// One key/value entry returned by the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Node {
    /// Full key path, including the namespace prefix.
    pub key: String,
    /// Value, empty for directories and deletions.
    pub value: String,
    /// Whether the node is a directory.
    pub dir: bool,
}

impl Node {
    /// Creates a leaf node.
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            dir: false,
        }
    }
}

/// # Client for a hierarchical key-value store.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use etcdenv::{KvStore, Node, StoreError};
///
/// struct Static;
///
/// #[async_trait]
/// impl KvStore for Static {
///     async fn get(&self, namespace: &str) -> Result<Vec<Node>, StoreError> {
///         Ok(vec![Node::leaf(format!("{namespace}/PORT"), "8080")])
///     }
///
///     async fn watch(&self, _namespace: &str, cancel: &CancellationToken) -> Result<Node, StoreError> {
///         cancel.cancelled().await;
///         Err(StoreError::Unreachable { error: "cancelled".into() })
///     }
/// }
/// ```
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Reads the nodes directly under `namespace`.
    async fn get(&self, namespace: &str) -> Result<Vec<Node>, StoreError>;

    /// Waits for the next change under `namespace` (recursively).
    ///
    /// Implementations should return promptly once `cancel` fires; callers also
    /// race the call against the token.
    async fn watch(&self, namespace: &str, cancel: &CancellationToken) -> Result<Node, StoreError>;
}
