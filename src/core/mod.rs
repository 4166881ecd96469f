//! Runtime core: configuration, orchestration and lifecycle.
//!
//! The public API from this module is [`Engine`], built by [`EngineBuilder`]
//! from an [`EngineConfig`], plus the signal helpers used by the binary.
//!
//! Internal modules:
//! - [`engine`]: central loop; owns the snapshot and the child;
//! - [`watcher`]: long-polls one namespace and queues qualifying changes;
//! - [`builder`]: wires store, supervisor, bus and subscribers;
//! - [`config`]: construction parameters and shutdown behavior;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod engine;
mod shutdown;
mod watcher;

pub use builder::EngineBuilder;
pub use config::{EngineConfig, ShutdownBehavior};
pub use engine::{Engine, Outcome};
pub use shutdown::{cancel_on_signal, wait_for_shutdown_signal};
