//! # Engine configuration.
//!
//! [`EngineConfig`] centralizes construction parameters: where configuration
//! lives (namespaces, endpoints), what to run (command), how to react to the
//! child exiting ([`ShutdownBehavior`]) and the retry knobs for both store
//! paths.
//!
//! ```rust
//! use etcdenv::{EngineConfig, ShutdownBehavior};
//!
//! let cfg = EngineConfig::new(
//!     vec!["/app/prod".into(), "/app/common".into()],
//!     vec!["http://127.0.0.1:4001".into()],
//!     vec!["env".into()],
//!     "restart",
//!     vec!["DATABASE_URL".into()],
//! )
//! .unwrap();
//! assert_eq!(cfg.shutdown, ShutdownBehavior::Restart);
//!
//! assert!(EngineConfig::new(vec!["/app".into()], vec![], vec![], "sometimes", vec![]).is_err());
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::EngineError;
use crate::policies::RetryPolicy;

/// Reaction to the child process exiting on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShutdownBehavior {
    /// Log the exit and keep watching; the next qualifying change starts it again.
    KeepAlive,
    /// Refresh the environment and start the child again.
    Restart,
    /// Stop the engine and report the child's exit status.
    #[default]
    Exit,
}

impl ShutdownBehavior {
    /// Literal accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownBehavior::KeepAlive => "keepalive",
            ShutdownBehavior::Restart => "restart",
            ShutdownBehavior::Exit => "exit",
        }
    }
}

impl FromStr for ShutdownBehavior {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keepalive" => Ok(ShutdownBehavior::KeepAlive),
            "restart" => Ok(ShutdownBehavior::Restart),
            "exit" => Ok(ShutdownBehavior::Exit),
            other => Err(EngineError::invalid(format!(
                "shutdown behavior must be one of keepalive, restart, exit (got {other:?})"
            ))),
        }
    }
}

impl fmt::Display for ShutdownBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction parameters of an [`Engine`](crate::Engine).
///
/// ## Field semantics
/// - `namespaces`: ordered; earlier namespaces win on merge and on key resolution
/// - `endpoints`: store endpoints, used when no store is supplied to the builder
/// - `command`: program and arguments, used when no supervisor is supplied
/// - `watched_keys`: empty = every change restarts the child
/// - `grace`: time between SIGTERM and SIGKILL when stopping the child
/// - `change_capacity`: queue between watchers and the central loop (min 1)
/// - `bus_capacity`: event bus ring buffer (min 1)
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub namespaces: Vec<String>,
    pub endpoints: Vec<String>,
    pub command: Vec<String>,
    pub shutdown: ShutdownBehavior,
    pub watched_keys: Vec<String>,
    /// Retry policy for namespace reads.
    pub fetch_retry: RetryPolicy,
    /// Retry policy for watch reconnects.
    pub watch_retry: RetryPolicy,
    pub grace: Duration,
    pub change_capacity: usize,
    pub bus_capacity: usize,
}

impl EngineConfig {
    /// Builds a config from the raw construction parameters.
    ///
    /// Fails with [`EngineError::InvalidConfiguration`] if `shutdown` is not one
    /// of `keepalive`, `restart`, `exit`, or if [`validate`](Self::validate) fails.
    pub fn new(
        namespaces: Vec<String>,
        endpoints: Vec<String>,
        command: Vec<String>,
        shutdown: &str,
        watched_keys: Vec<String>,
    ) -> Result<Self, EngineError> {
        let cfg = Self {
            namespaces,
            endpoints,
            command,
            shutdown: shutdown.parse()?,
            watched_keys,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.namespaces.is_empty() {
            return Err(EngineError::invalid("at least one namespace is required"));
        }
        if let Some(ns) = self.namespaces.iter().find(|ns| ns.is_empty()) {
            return Err(EngineError::invalid(format!("empty namespace {ns:?}")));
        }
        Ok(())
    }

    #[inline]
    pub fn change_capacity_clamped(&self) -> usize {
        self.change_capacity.max(1)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - no namespaces, no command
    /// - `endpoints = ["http://127.0.0.1:4001"]`
    /// - `shutdown = exit`
    /// - `fetch_retry = RetryPolicy::fetch_default()`, `watch_retry = RetryPolicy::watch_default()`
    /// - `grace = 10s`, `change_capacity = 64`, `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            endpoints: vec!["http://127.0.0.1:4001".into()],
            command: Vec::new(),
            shutdown: ShutdownBehavior::default(),
            watched_keys: Vec::new(),
            fetch_retry: RetryPolicy::fetch_default(),
            watch_retry: RetryPolicy::watch_default(),
            grace: Duration::from_secs(10),
            change_capacity: 64,
            bus_capacity: 1024,
        }
    }
}
