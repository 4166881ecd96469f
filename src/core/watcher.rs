//! # NamespaceWatcher: long-poll one namespace and forward qualifying changes.
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!      Connecting ─► Watching ──┬─ Ok(node) ─► resolve name │
//!            ▲                  │      should_restart(snapshot)?
//!            │                  │        ├─ no  ───────────►┘
//!            │                  │        └─ yes ─► ChangeQueued ─► changes.send()
//!            │                  ├─ Unrecognized ─► WatchFailed ─► Connecting (no delay)
//!            │                  └─ Unreachable / KeyNotFound ─► WatchFailed
//!            │                           └─ next_delay()
//!            │                                 ├─ Some(d) ─► BackingOff(d)
//!            └──────── sleep(d) ◄──────────────┘
//!                                              └─ None ─► Stopped(exhausted)
//!
//!   token.cancelled() in any state ─► Stopped(cancelled)
//!   changes receiver gone           ─► Stopped(engine gone)
//! ```
//!
//! The restart decision is made against the latest snapshot published by the
//! central loop. Backoff resets after every successful watch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    env::{Env, Namespaces, WatchedKeys},
    events::{BackoffSource, Bus, Event, EventKind},
    policies::{Backoff, RetryPolicy},
    store::{KvStore, Node},
};

/// A qualifying change, queued for the central loop.
#[derive(Debug, Clone)]
pub(crate) struct ChangeEvent {
    pub(crate) namespace: Arc<str>,
    pub(crate) name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    Exhausted,
    EngineGone,
}

impl StopReason {
    fn as_str(&self) -> &'static str {
        match self {
            StopReason::Cancelled => "cancelled",
            StopReason::Exhausted => "watch retries exhausted",
            StopReason::EngineGone => "change queue closed",
        }
    }
}

#[derive(Debug)]
enum WatchState {
    Connecting,
    Watching,
    BackingOff(Duration),
    Stopped(StopReason),
}

/// Watches one namespace until cancelled or out of retries.
pub(crate) struct NamespaceWatcher {
    namespace: Arc<str>,
    store: Arc<dyn KvStore>,
    namespaces: Namespaces,
    watched: Arc<WatchedKeys>,
    snapshot: watch::Receiver<Arc<Env>>,
    changes: mpsc::Sender<ChangeEvent>,
    retry: RetryPolicy,
    bus: Bus,
}

impl NamespaceWatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        namespace: &str,
        store: Arc<dyn KvStore>,
        namespaces: Namespaces,
        watched: Arc<WatchedKeys>,
        snapshot: watch::Receiver<Arc<Env>>,
        changes: mpsc::Sender<ChangeEvent>,
        retry: RetryPolicy,
        bus: Bus,
    ) -> Self {
        Self {
            namespace: Arc::from(namespace),
            store,
            namespaces,
            watched,
            snapshot,
            changes,
            retry,
            bus,
        }
    }

    /// Runs the watch loop; see the module docs for the state machine.
    pub(crate) async fn run(self, token: CancellationToken) {
        let mut backoff = self.retry.start();
        let mut state = WatchState::Connecting;

        loop {
            state = match state {
                WatchState::Connecting if token.is_cancelled() => {
                    WatchState::Stopped(StopReason::Cancelled)
                }
                WatchState::Connecting => WatchState::Watching,
                WatchState::Watching => self.watch_once(&token, &mut backoff).await,
                WatchState::BackingOff(delay) => {
                    tokio::select! {
                        _ = time::sleep(delay) => WatchState::Connecting,
                        _ = token.cancelled() => WatchState::Stopped(StopReason::Cancelled),
                    }
                }
                WatchState::Stopped(reason) => {
                    self.bus.publish(
                        Event::new(EventKind::WatcherStopped)
                            .with_namespace(self.namespace.clone())
                            .with_reason(reason.as_str()),
                    );
                    return;
                }
            };
        }
    }

    async fn watch_once(&self, token: &CancellationToken, backoff: &mut Backoff) -> WatchState {
        let res = tokio::select! {
            res = self.store.watch(&self.namespace, token) => res,
            _ = token.cancelled() => return WatchState::Stopped(StopReason::Cancelled),
        };

        match res {
            Ok(node) => {
                backoff.reset();
                self.on_change(node, token).await
            }
            Err(err) if err.is_retryable() => {
                self.bus.publish(
                    Event::new(EventKind::WatchFailed)
                        .with_namespace(self.namespace.clone())
                        .with_attempt(backoff.attempt())
                        .with_reason(err.to_string()),
                );
                match backoff.next_delay() {
                    Some(delay) => {
                        self.bus.publish(
                            Event::new(EventKind::BackoffScheduled)
                                .with_namespace(self.namespace.clone())
                                .with_attempt(backoff.attempt())
                                .with_delay(delay)
                                .with_backoff_source(BackoffSource::Watch),
                        );
                        WatchState::BackingOff(delay)
                    }
                    None => WatchState::Stopped(StopReason::Exhausted),
                }
            }
            Err(err) => {
                self.bus.publish(
                    Event::new(EventKind::WatchFailed)
                        .with_namespace(self.namespace.clone())
                        .with_reason(err.to_string()),
                );
                WatchState::Connecting
            }
        }
    }

    async fn on_change(&self, node: Node, token: &CancellationToken) -> WatchState {
        let name = self.namespaces.resolve(&node.key);
        self.bus.publish(
            Event::new(EventKind::KeyChanged)
                .with_namespace(self.namespace.clone())
                .with_key(node.key.as_str()),
        );

        // The borrow must end before the send below awaits.
        let qualifies = {
            let current = self.snapshot.borrow();
            self.watched.should_restart(&current, &name, &node.value)
        };
        if !qualifies {
            return WatchState::Connecting;
        }

        self.bus.publish(
            Event::new(EventKind::ChangeQueued)
                .with_namespace(self.namespace.clone())
                .with_key(name.as_str()),
        );
        let change = ChangeEvent {
            namespace: self.namespace.clone(),
            name,
        };
        tokio::select! {
            res = self.changes.send(change) => match res {
                Ok(()) => WatchState::Connecting,
                Err(_) => WatchState::Stopped(StopReason::EngineGone),
            },
            _ = token.cancelled() => WatchState::Stopped(StopReason::Cancelled),
        }
    }
}
