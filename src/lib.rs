//! # etcdenv
//!
//! **etcdenv** runs a command with its environment taken from one or more
//! etcd namespaces, and restarts it when those keys change.
//!
//! Namespaces are ordered: on a name collision the earlier namespace wins.
//! Changes can be filtered to an allow-list of variable names, and the
//! reaction to the child exiting on its own is configurable.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  namespace   │   │  namespace   │   │  namespace   │
//!     │   /app/prod  │   │ /app/common  │   │     ...      │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Namespace   │   │  Namespace   │   │  Namespace   │
//!     │   Watcher    │   │   Watcher    │   │   Watcher    │
//!     │(long-poll +  │   │(long-poll +  │   │(long-poll +  │
//!     │  backoff)    │   │  backoff)    │   │  backoff)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │  qualifying changes (bounded mpsc)  │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Engine (central loop)                                            │
//! │  - Fetcher (all namespaces, merged, retried)                      │
//! │  - snapshot (watch::Sender<Arc<Env>>, read by watchers)           │
//! │  - Supervise (ChildProcess: start / restart / stop)               │
//! │  - ExitListener (re-armed on every start/restart)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   │ publish(Event)
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │               (capacity: EngineConfig::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                          ┌────────┴────────┐
//!                          ▼                 ▼
//!                      LogWriter        custom subs
//! ```
//!
//! ### Lifecycle
//! ```text
//! fetch_all ──► start(child) ──► watchers
//!
//! loop {
//!   ├─ qualifying change ─► fetch_all ─► restart(child)
//!   ├─ child exited      ─► keepalive: wait for next change
//!   │                       restart:   fetch_all ─► restart(child)
//!   │                       exit:      stop, return Exited(status)
//!   └─ shutdown          ─► cancel watchers, stop(child), return Stopped
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                       |
//! |-------------------|-------------------------------------------------------------|------------------------------------------|
//! | **Engine**        | Coordinates fetch, watch and supervision.                   | [`Engine`], [`EngineBuilder`]            |
//! | **Store**         | Key-value store seam and the etcd v2 client.                | [`KvStore`], [`EtcdClient`]              |
//! | **Process**       | Child process seam and the OS implementation.               | [`Supervise`], [`ChildProcess`]          |
//! | **Environment**   | Key resolution, merge order and restart decision.           | [`Namespaces`], [`WatchedKeys`], [`Env`] |
//! | **Policies**      | Backoff and retry limits for both store paths.              | [`RetryPolicy`], [`BackoffPolicy`]       |
//! | **Subscriber API**| Hook into engine events (logging, custom subscribers).      | [`Subscribe`], [`LogWriter`]             |
//! | **Errors**        | Typed errors for store, process and engine.                 | [`StoreError`], [`EngineError`]          |
//! | **Configuration** | Centralize engine settings.                                 | [`EngineConfig`]                         |
//!
//! ## Example
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use etcdenv::{EngineBuilder, EngineConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = EngineConfig::new(
//!         vec!["/environments/production".into()],
//!         vec!["http://127.0.0.1:4001".into()],
//!         vec!["env".into()],
//!         "exit",
//!         Vec::new(),
//!     )?;
//!
//!     let shutdown = CancellationToken::new();
//!     etcdenv::cancel_on_signal(shutdown.clone());
//!
//!     let outcome = EngineBuilder::new(cfg).build()?.run(shutdown).await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
mod core;
mod env;
mod error;
mod events;
mod policies;
mod process;
mod store;
mod subscribers;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use core::{
    Engine, EngineBuilder, EngineConfig, Outcome, ShutdownBehavior, cancel_on_signal,
    wait_for_shutdown_signal,
};
pub use env::{Env, Fetcher, Namespaces, WatchedKeys};
pub use error::{EngineError, ProcessError, StoreError};
pub use events::{BackoffSource, Bus, Event, EventKind};
pub use policies::{Backoff, BackoffPolicy, JitterPolicy, RetryPolicy};
pub use process::{ChildProcess, ExitListener, ExitNotifier, Supervise, exit_channel};
pub use store::{EtcdClient, KvStore, Node};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
