//! Retry and backoff policies.
//!
//! This module groups the knobs that control **how long** to wait between
//! store calls and **when to give up**.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized reconnects
//! - [`RetryPolicy`]   a backoff policy plus attempt/elapsed caps
//! - [`Backoff`]       per-call retry state produced by [`RetryPolicy::start`]
//!
//! ## Quick wiring
//! ```text
//! EngineConfig { fetch_retry: RetryPolicy, watch_retry: RetryPolicy }
//!      ├─► env::Fetcher        fetch_retry.start() per namespace per fetch cycle
//!      └─► core::watcher       watch_retry.start(), reset after every successful watch
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=500ms, factor=1.5, max=60s, jitter=Equal.
//! - `RetryPolicy::fetch_default()` → 3 retries, no elapsed cap.
//! - `RetryPolicy::watch_default()` → unlimited retries, 15 minutes elapsed cap.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{Backoff, RetryPolicy};
