//! # LogWriter: events as tracing records
//!
//! Renders each [`Event`] as a structured `tracing` record under the
//! `etcdenv::events` target.
//!
//! ## Example output (fmt layer)
//! ```text
//! WARN  fetch failed namespace="/app" attempt=0 err="store unreachable: ..."
//! WARN  backoff namespace="/app" delay_ms=500 attempt=1 source=Fetch
//! INFO  process restarted vars=12 reason="config changed"
//! INFO  process exited status=1
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let ns = e.namespace.as_deref().unwrap_or("");
        let key = e.key.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::FetchFailed => {
                warn!(target: "etcdenv::events", namespace = ns, attempt = e.attempt, err = reason, "fetch failed");
            }
            EventKind::BackoffScheduled => {
                warn!(
                    target: "etcdenv::events",
                    namespace = ns,
                    delay_ms = e.delay_ms,
                    attempt = e.attempt,
                    source = ?e.backoff_source,
                    "backoff"
                );
            }
            EventKind::FetchExhausted => {
                warn!(target: "etcdenv::events", namespace = ns, attempt = e.attempt, "giving up on namespace, using no values from it");
            }
            EventKind::EnvRefreshed => {
                info!(target: "etcdenv::events", vars = e.vars, "environment refreshed");
            }
            EventKind::KeyChanged => {
                info!(target: "etcdenv::events", namespace = ns, key, "key changed");
            }
            EventKind::ChangeQueued => {
                info!(target: "etcdenv::events", namespace = ns, key, "restart queued");
            }
            EventKind::WatchFailed => {
                warn!(target: "etcdenv::events", namespace = ns, err = reason, "watch failed");
            }
            EventKind::WatcherStopped => {
                warn!(target: "etcdenv::events", namespace = ns, reason, "watcher stopped");
            }
            EventKind::ProcessStarted => {
                info!(target: "etcdenv::events", vars = e.vars, "process started");
            }
            EventKind::ProcessRestarted => {
                info!(target: "etcdenv::events", vars = e.vars, reason, "process restarted");
            }
            EventKind::ProcessExited => {
                info!(target: "etcdenv::events", status = e.status, "process exited");
            }
            EventKind::ProcessStopped => {
                info!(target: "etcdenv::events", "process stopped");
            }
            EventKind::ShutdownRequested => {
                info!(target: "etcdenv::events", reason, status = e.status, "shutdown requested");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "etcdenv::events", subscriber = key, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "etcdenv::events", subscriber = key, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
