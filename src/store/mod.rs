//! Key-value store seam.
//!
//! The engine only ever talks to a [`KvStore`]: a blocking subtree read and a
//! single-shot subtree watch, both reporting failures as a closed
//! [`StoreError`](crate::StoreError) kind.
//!
//! ## Contents
//! - [`KvStore`], [`Node`] the client contract
//! - [`EtcdClient`] etcd v2 keys API over HTTP

mod client;
mod etcd;

pub use client::{KvStore, Node};
pub use etcd::EtcdClient;
