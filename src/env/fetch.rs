//! # Namespace fetching with retry.
//!
//! [`Fetcher::fetch_namespace`] reads one namespace, retrying retryable
//! store errors on a fresh [`Backoff`](crate::Backoff) until the retry cap,
//! after which the namespace degrades to an empty map. An unrecognized
//! error is fatal and returned as [`EngineError::Store`].
//!
//! ```text
//! loop {
//!   get(ns) ─┬─ Ok(nodes)          ─► resolve keys, first wins ─► return
//!            ├─ Unreachable/NotFound ─► FetchFailed
//!            │     ├─ next_delay() = Some(d) ─► BackoffScheduled, sleep(d), retry
//!            │     └─ next_delay() = None    ─► FetchExhausted, return {}
//!            └─ Unrecognized        ─► Err(EngineError::Store)
//! }
//! ```

use std::sync::Arc;

use tokio::time;

use crate::{
    env::{Env, Namespaces},
    error::EngineError,
    events::{BackoffSource, Bus, Event, EventKind},
    policies::RetryPolicy,
    store::{KvStore, Node},
};

/// Reads namespaces from the store and merges them into one [`Env`].
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<dyn KvStore>,
    namespaces: Namespaces,
    retry: RetryPolicy,
    bus: Bus,
}

impl Fetcher {
    pub fn new(
        store: Arc<dyn KvStore>,
        namespaces: Namespaces,
        retry: RetryPolicy,
        bus: Bus,
    ) -> Self {
        Self {
            store,
            namespaces,
            retry,
            bus,
        }
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Fetches every namespace in order and merges them; earlier namespaces win.
    pub async fn fetch_all(&self) -> Result<Env, EngineError> {
        let mut merged = Env::new();
        for namespace in self.namespaces.iter() {
            for (name, value) in self.fetch_namespace(namespace).await? {
                merged.entry(name).or_insert(value);
            }
        }
        Ok(merged)
    }

    /// Fetches a single namespace; see the module docs for the retry flow.
    pub async fn fetch_namespace(&self, namespace: &str) -> Result<Env, EngineError> {
        let mut backoff = self.retry.start();

        loop {
            let err = match self.store.get(namespace).await {
                Ok(nodes) => return Ok(self.collect(nodes)),
                Err(err) if err.is_retryable() => err,
                Err(source) => {
                    return Err(EngineError::Store {
                        namespace: namespace.to_string(),
                        source,
                    });
                }
            };

            self.bus.publish(
                Event::new(EventKind::FetchFailed)
                    .with_namespace(namespace)
                    .with_attempt(backoff.attempt())
                    .with_reason(err.to_string()),
            );

            let Some(delay) = backoff.next_delay() else {
                self.bus.publish(
                    Event::new(EventKind::FetchExhausted)
                        .with_namespace(namespace)
                        .with_attempt(backoff.attempt()),
                );
                return Ok(Env::new());
            };

            self.bus.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_namespace(namespace)
                    .with_attempt(backoff.attempt())
                    .with_delay(delay)
                    .with_backoff_source(BackoffSource::Fetch),
            );
            time::sleep(delay).await;
        }
    }

    fn collect(&self, nodes: Vec<Node>) -> Env {
        let mut env = Env::new();
        for node in nodes.into_iter().filter(|n| !n.dir) {
            env.entry(self.namespaces.resolve(&node.key))
                .or_insert(node.value);
        }
        env
    }
}
