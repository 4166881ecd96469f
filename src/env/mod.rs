//! Environment snapshot: namespaces, merging, and the restart decision.
//!
//! ## Contents
//! - [`Env`]         the merged variable map handed to the child
//! - [`Namespaces`]  ordered namespace list and key resolution
//! - [`WatchedKeys`] allow-list deciding which changes restart the child
//! - [`Fetcher`]     per-namespace and aggregate fetch with retry
//!
//! ```text
//! store.get(ns[0]) ─► resolve keys ─┐
//! store.get(ns[1]) ─► resolve keys ─┼─► first-write-wins merge ─► Env
//! store.get(ns[N]) ─► resolve keys ─┘
//! ```

mod fetch;
mod namespace;
mod watched;

use std::collections::BTreeMap;

pub use fetch::Fetcher;
pub use namespace::Namespaces;
pub use watched::WatchedKeys;

/// Complete merged environment: variable name → value.
pub type Env = BTreeMap<String, String>;
