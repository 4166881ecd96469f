//! # Events emitted by the engine.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Fetch events**: store reads, retries and degradation
//! - **Watch events**: key changes and watcher failures
//! - **Process events**: child lifecycle
//! - **Subscriber events**: fan-out health
//!
//! ## Ordering guarantees
//! Each event has a globally unique, monotonically increasing sequence
//! number (`seq`).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use etcdenv::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_namespace("/app")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(750));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.namespace.as_deref(), Some("/app"));
//! assert_eq!(ev.delay_ms, Some(750));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `reason` (panic message) and `key` (subscriber name).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `reason` and `key` (subscriber name).
    SubscriberOverflow,

    // === Fetch events ===
    /// A namespace read failed with a retryable error.
    ///
    /// Sets `namespace`, `attempt` (retries so far), `reason`.
    FetchFailed,

    /// The next store call was delayed.
    ///
    /// Sets `namespace`, `attempt`, `delay_ms`, `backoff_source`.
    BackoffScheduled,

    /// A namespace exhausted its retries and contributes nothing.
    ///
    /// Sets `namespace`, `attempt`.
    FetchExhausted,

    /// The snapshot was replaced by a complete fetch.
    ///
    /// Sets `vars` (number of variables).
    EnvRefreshed,

    // === Watch events ===
    /// A key under a watched namespace changed.
    ///
    /// Sets `namespace`, `key` (raw store key).
    KeyChanged,

    /// A change qualified for a restart and was queued for the central loop.
    ///
    /// Sets `namespace`, `key` (resolved variable name).
    ChangeQueued,

    /// A watch call failed.
    ///
    /// Sets `namespace`, `reason`.
    WatchFailed,

    /// A watcher exited.
    ///
    /// Sets `namespace`, `reason`.
    WatcherStopped,

    // === Process events ===
    /// The child was started for the first time.
    ///
    /// Sets `vars`.
    ProcessStarted,

    /// The child was restarted with a refreshed snapshot.
    ///
    /// Sets `vars`, `reason` (`"config changed"` or `"process exited"`).
    ProcessRestarted,

    /// The child exited.
    ///
    /// Sets `status`.
    ProcessExited,

    /// The child was stopped by the engine.
    ProcessStopped,

    /// Shutdown was requested (external signal or `exit` behavior).
    ShutdownRequested,
}

/// Which path scheduled a backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffSource {
    Fetch,
    Watch,
}

/// Engine event with optional metadata.
///
/// Fields other than `seq`, `at` and `kind` are set depending on the [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Namespace the event relates to.
    pub namespace: Option<Arc<str>>,
    /// Store key, variable name or subscriber name.
    pub key: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Retry attempt number.
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Child exit status.
    pub status: Option<i32>,
    /// Number of variables in the snapshot.
    pub vars: Option<usize>,
    /// Source for backoff scheduling.
    pub backoff_source: Option<BackoffSource>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            namespace: None,
            key: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            status: None,
            vars: None,
            backoff_source: None,
        }
    }

    #[inline]
    pub fn with_namespace(mut self, namespace: impl Into<Arc<str>>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn with_vars(mut self, vars: usize) -> Self {
        self.vars = Some(vars);
        self
    }

    #[inline]
    pub fn with_backoff_source(mut self, source: BackoffSource) -> Self {
        self.backoff_source = Some(source);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_key(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_key(subscriber)
            .with_reason(info)
    }
}
