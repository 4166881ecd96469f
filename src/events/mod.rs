//! Engine events: types and broadcast bus.
//!
//! Every retry, backoff wait, refresh and process lifecycle step is
//! published as an [`Event`]. Subscribers (the built-in
//! [`LogWriter`](crate::LogWriter) among them) turn them into log lines.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Engine`, `Fetcher`, namespace watchers, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: `Engine::subscriber_listener()` fanning out to
//!   `SubscriberSet`, and tests subscribing directly.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{BackoffSource, Event, EventKind};
