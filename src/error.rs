//! Error types used by the etcdenv engine and its collaborators.
//!
//! This module defines three error enums:
//!
//! - [`StoreError`]: errors reported by a [`KvStore`](crate::KvStore) call.
//! - [`ProcessError`]: errors reported by a [`Supervise`](crate::Supervise) implementation.
//! - [`EngineError`]: errors that terminate construction or [`Engine::run`](crate::Engine::run).
//!
//! All types provide `as_label` for logs, and [`StoreError::is_retryable`]
//! drives the retry decision on fetch and watch paths.

use thiserror::Error;

/// # Errors produced by the key-value store client.
///
/// The store abstraction classifies every failure into one of these kinds,
/// so callers match on the variant instead of inspecting error types.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No configured endpoint could be reached.
    #[error("store unreachable: {error}")]
    Unreachable {
        /// The underlying error message.
        error: String,
    },

    /// The requested namespace or key does not exist.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The key that was requested.
        key: String,
    },

    /// Anything the client cannot classify (malformed reply, unknown error code, ...).
    #[error("unrecognized store error: {error}")]
    Unrecognized {
        /// The underlying error message.
        error: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use etcdenv::StoreError;
    ///
    /// let err = StoreError::KeyNotFound { key: "/app".into() };
    /// assert_eq!(err.as_label(), "store_key_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Unreachable { .. } => "store_unreachable",
            StoreError::KeyNotFound { .. } => "store_key_not_found",
            StoreError::Unrecognized { .. } => "store_unrecognized",
        }
    }

    /// Indicates whether the error should be retried with backoff.
    ///
    /// Returns `true` for [`StoreError::Unreachable`] and [`StoreError::KeyNotFound`].
    ///
    /// # Example
    /// ```
    /// use etcdenv::StoreError;
    ///
    /// assert!(StoreError::Unreachable { error: "refused".into() }.is_retryable());
    /// assert!(!StoreError::Unrecognized { error: "garbage".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Unreachable { .. } | StoreError::KeyNotFound { .. }
        )
    }
}

/// # Errors produced by the process supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The configured command line is empty.
    #[error("no command to run")]
    EmptyCommand,

    /// The child could not be spawned.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::EmptyCommand => "process_empty_command",
            ProcessError::Spawn { .. } => "process_spawn",
        }
    }
}

/// # Errors that stop the engine.
///
/// Store failures other than [`StoreError::Unrecognized`] on the fetch path
/// are absorbed by retry and never surface here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// Construction parameters were rejected; the engine never starts.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What was wrong.
        reason: String,
    },

    /// The store returned an error the fetch path cannot reason about.
    #[error("fatal store error while fetching {namespace:?}: {source}")]
    Store {
        /// Namespace being fetched.
        namespace: String,
        /// The unclassified store error.
        #[source]
        source: StoreError,
    },

    /// The supervised process could not be started or stopped.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use etcdenv::EngineError;
    ///
    /// let err = EngineError::InvalidConfiguration { reason: "no namespaces".into() };
    /// assert_eq!(err.as_label(), "engine_invalid_configuration");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::InvalidConfiguration { .. } => "engine_invalid_configuration",
            EngineError::Store { .. } => "engine_store",
            EngineError::Process(_) => "engine_process",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        EngineError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
