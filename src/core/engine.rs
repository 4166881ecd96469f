//! # Engine: fetch, supervise, watch, react.
//!
//! The [`Engine`] owns the snapshot and the supervised child, and is the only
//! place where either changes. Watchers run concurrently and only forward
//! qualifying changes over a bounded queue, so every refresh and restart is
//! serialized through one loop.
//!
//! ## Architecture
//! ```text
//! Startup:
//!   subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   refresh():  Fetcher::fetch_all() ─► snapshot ─► watch::Sender<Arc<Env>>
//!   Supervise::start(&snapshot)      ─► ExitListener
//!   one NamespaceWatcher per namespace (child token of `shutdown`)
//!
//! Central loop (select!):
//!   shutdown.cancelled()  ─► cancel watchers, drop listener, Supervise::stop()
//!   changes.recv()        ─► refresh() ─► Supervise::restart() ─► new ExitListener
//!                            (ignored once shutdown has begun)
//!   listener.wait()       ─► ProcessExited, then by ShutdownBehavior:
//!                              KeepAlive ─► keep watching, no listener
//!                              Restart   ─► refresh() ─► Supervise::restart()
//!                              Exit      ─► cancel shutdown, Supervise::stop(),
//!                                           return Exited(status)
//!
//! Termination:
//!   no watcher left and no listener armed ─► return Stopped
//! ```
//!
//! ## Rules
//! - The listener is replaced in the same handler that restarts the child, so
//!   an exit can never fall between two incarnations.
//! - A listener is dropped as soon as it yields; it is never polled twice.
//! - A fatal fetch or process error stops the child before `run` returns it.

use std::sync::Arc;

use tokio::{
    sync::{broadcast::error::RecvError, mpsc, watch},
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::ShutdownBehavior,
        watcher::{ChangeEvent, NamespaceWatcher},
    },
    env::{Env, Fetcher, WatchedKeys},
    error::EngineError,
    events::{Bus, Event, EventKind},
    policies::RetryPolicy,
    process::{ExitListener, Supervise},
    store::KvStore,
    subscribers::{Subscribe, SubscriberSet},
};

/// How [`Engine::run`] ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Shut down on request, or nothing was left to supervise.
    Stopped,
    /// The child exited under [`ShutdownBehavior::Exit`] with this status.
    Exited(i32),
}

impl Outcome {
    /// Process exit code to report for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Stopped => 0,
            Outcome::Exited(status) => *status,
        }
    }
}

/// Coordinates fetchers, watchers and the supervised child.
///
/// Built with [`EngineBuilder`](crate::EngineBuilder); consumed by [`run`](Engine::run).
pub struct Engine {
    behavior: ShutdownBehavior,
    fetcher: Fetcher,
    store: Arc<dyn KvStore>,
    process: Box<dyn Supervise>,
    watched: Arc<WatchedKeys>,
    watch_retry: RetryPolicy,
    change_capacity: usize,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    env: Arc<Env>,
    snapshot: watch::Sender<Arc<Env>>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        behavior: ShutdownBehavior,
        fetcher: Fetcher,
        store: Arc<dyn KvStore>,
        process: Box<dyn Supervise>,
        watched: WatchedKeys,
        watch_retry: RetryPolicy,
        change_capacity: usize,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let env = Arc::new(Env::new());
        let (snapshot, _rx) = watch::channel(env.clone());
        Self {
            behavior,
            fetcher,
            store,
            process,
            watched: Arc::new(watched),
            watch_retry,
            change_capacity,
            bus,
            subscribers,
            env,
            snapshot,
        }
    }

    /// Returns a handle to the event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs until `shutdown` is cancelled, the child exits under
    /// [`ShutdownBehavior::Exit`], or nothing is left to supervise.
    ///
    /// Under `Exit`, `shutdown` is cancelled by the engine itself so that
    /// anything else sharing the token winds down too.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<Outcome, EngineError> {
        let subs = SubscriberSet::new(std::mem::take(&mut self.subscribers), self.bus.clone());
        let flushed = CancellationToken::new();
        let listener = self.subscriber_listener(subs, flushed.clone());

        let res = self.drive(&shutdown).await;
        if let Err(e) = &res {
            self.bus.publish(
                Event::new(EventKind::ShutdownRequested).with_reason(e.as_label()),
            );
            if let Err(stop_err) = self.process.stop().await {
                tracing::warn!(error = %stop_err, "stopping child after engine error failed");
            }
        }

        flushed.cancel();
        if let Err(e) = listener.await {
            tracing::warn!(error = %e, "subscriber listener aborted");
        }
        res
    }

    /// Forwards bus events to the subscriber set until `flushed` fires, then
    /// drains what is still buffered and waits for subscribers to finish.
    fn subscriber_listener(&self, subs: SubscriberSet, flushed: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => subs.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = flushed.cancelled() => {
                        while let Ok(ev) = rx.try_recv() {
                            subs.emit(&ev);
                        }
                        break;
                    }
                }
            }
            subs.shutdown().await;
        })
    }

    async fn drive(&mut self, shutdown: &CancellationToken) -> Result<Outcome, EngineError> {
        self.refresh().await?;
        let mut exit = Some(self.process.start(&self.env).await?);
        self.bus
            .publish(Event::new(EventKind::ProcessStarted).with_vars(self.env.len()));

        let watch_token = shutdown.child_token();
        let (tx, mut changes) = mpsc::channel(self.change_capacity);
        let mut watchers = JoinSet::new();
        self.spawn_watchers(&mut watchers, &watch_token, tx);

        let mut watching = true;
        let mut stopping = false;

        loop {
            if !watching && exit.is_none() {
                return Ok(Outcome::Stopped);
            }

            tokio::select! {
                _ = shutdown.cancelled(), if !stopping => {
                    stopping = true;
                    self.bus.publish(Event::new(EventKind::ShutdownRequested));
                    watch_token.cancel();
                    exit = None;
                    self.stop().await?;
                }
                change = changes.recv(), if watching => match change {
                    Some(change) if !stopping => {
                        tracing::debug!(namespace = %change.namespace, key = %change.name, "applying change");
                        exit = Some(self.restart("config changed").await?);
                    }
                    Some(_) => {}
                    None => watching = false,
                },
                status = wait_exit(&mut exit) => {
                    exit = None;
                    let Some(status) = status else { continue };
                    self.bus
                        .publish(Event::new(EventKind::ProcessExited).with_status(status));

                    match self.behavior {
                        ShutdownBehavior::KeepAlive => {}
                        ShutdownBehavior::Restart => {
                            exit = Some(self.restart("process exited").await?);
                        }
                        ShutdownBehavior::Exit => {
                            self.bus.publish(
                                Event::new(EventKind::ShutdownRequested).with_status(status),
                            );
                            shutdown.cancel();
                            watch_token.cancel();
                            self.stop().await?;
                            return Ok(Outcome::Exited(status));
                        }
                    }
                }
            }
        }
    }

    fn spawn_watchers(
        &self,
        set: &mut JoinSet<()>,
        token: &CancellationToken,
        changes: mpsc::Sender<ChangeEvent>,
    ) {
        let namespaces = self.fetcher.namespaces();
        for namespace in namespaces.iter() {
            let watcher = NamespaceWatcher::new(
                namespace,
                Arc::clone(&self.store),
                namespaces.clone(),
                Arc::clone(&self.watched),
                self.snapshot.subscribe(),
                changes.clone(),
                self.watch_retry,
                self.bus.clone(),
            );
            set.spawn(watcher.run(token.clone()));
        }
    }

    /// Replaces the snapshot with a complete fetch and publishes it to watchers.
    async fn refresh(&mut self) -> Result<(), EngineError> {
        let env = self.fetcher.fetch_all().await?;
        self.env = Arc::new(env);
        self.snapshot.send_replace(Arc::clone(&self.env));
        self.bus
            .publish(Event::new(EventKind::EnvRefreshed).with_vars(self.env.len()));
        Ok(())
    }

    async fn restart(&mut self, reason: &'static str) -> Result<ExitListener, EngineError> {
        self.refresh().await?;
        let listener = self.process.restart(&self.env).await?;
        self.bus.publish(
            Event::new(EventKind::ProcessRestarted)
                .with_vars(self.env.len())
                .with_reason(reason),
        );
        Ok(listener)
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.process.stop().await?;
        self.bus.publish(Event::new(EventKind::ProcessStopped));
        Ok(())
    }
}

/// Waits on the armed listener, or forever when none is armed.
async fn wait_exit(exit: &mut Option<ExitListener>) -> Option<i32> {
    match exit {
        Some(listener) => listener.wait().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EngineBuilder, EngineConfig};
    use crate::error::StoreError;
    use crate::store::Node;
    use crate::test_support::{
        Call, EventLog, EventRecorder, ProcessHandle, RecordingProcess, ScriptedStore, fast_retry,
        unreachable,
    };

    fn env(pairs: &[(&str, &str)]) -> Env {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    struct Running {
        store: Arc<ScriptedStore>,
        process: ProcessHandle,
        events: EventLog,
        shutdown: CancellationToken,
        task: JoinHandle<Result<Outcome, EngineError>>,
    }

    fn config(behavior: ShutdownBehavior, watched: &[&str]) -> EngineConfig {
        EngineConfig {
            namespaces: vec!["/app".into()],
            shutdown: behavior,
            watched_keys: watched.iter().map(|s| s.to_string()).collect(),
            fetch_retry: fast_retry(Some(2)),
            watch_retry: fast_retry(None),
            ..EngineConfig::default()
        }
    }

    fn launch(behavior: ShutdownBehavior, watched: &[&str], seed: &[(&str, &str)]) -> Running {
        let store = ScriptedStore::new();
        for (k, v) in seed {
            store.set("/app", k, v);
        }
        launch_with(store, config(behavior, watched))
    }

    fn launch_with(store: Arc<ScriptedStore>, cfg: EngineConfig) -> Running {
        let (process, handle) = RecordingProcess::new();
        let (events, log) = EventRecorder::new();

        let engine = EngineBuilder::new(cfg)
            .with_store(store.clone())
            .with_process(process)
            .with_subscribers(vec![Arc::new(events)])
            .build()
            .unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(engine.run(shutdown.clone()));
        Running {
            store,
            process: handle,
            events: log,
            shutdown,
            task,
        }
    }

    #[tokio::test]
    async fn test_keepalive_does_not_restart_on_exit() {
        let mut r = launch(ShutdownBehavior::KeepAlive, &[], &[("FOO", "1")]);
        assert_eq!(r.process.next_call().await, Call::Start(env(&[("FOO", "1")])));

        r.process.exit(1);
        r.events.wait_for(EventKind::ProcessExited).await;

        r.shutdown.cancel();
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
        assert_eq!(
            r.process.calls(),
            vec![Call::Start(env(&[("FOO", "1")])), Call::Stop]
        );
    }

    #[tokio::test]
    async fn test_keepalive_restarts_on_next_change() {
        let mut r = launch(ShutdownBehavior::KeepAlive, &[], &[("FOO", "1")]);
        r.process.next_call().await;
        r.process.exit(0);
        r.events.wait_for(EventKind::ProcessExited).await;

        r.store.set("/app", "FOO", "2");
        r.store.push_watch("/app", Ok(Node::leaf("/app/FOO", "2")));
        assert_eq!(r.process.next_call().await, Call::Restart(env(&[("FOO", "2")])));

        r.shutdown.cancel();
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
    }

    #[tokio::test]
    async fn test_restart_behavior_refreshes_before_restart() {
        let mut r = launch(ShutdownBehavior::Restart, &[], &[("FOO", "1")]);
        r.process.next_call().await;

        r.store.set("/app", "FOO", "2");
        r.process.exit(0);
        assert_eq!(r.process.next_call().await, Call::Restart(env(&[("FOO", "2")])));
        assert_eq!(r.store.get_calls("/app"), 2);

        r.shutdown.cancel();
        assert_eq!(r.process.next_call().await, Call::Stop);
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
    }

    #[tokio::test]
    async fn test_restart_behavior_rearms_listener() {
        let mut r = launch(ShutdownBehavior::Restart, &[], &[]);
        r.process.next_call().await;

        for _ in 0..3 {
            r.process.exit(0);
            assert!(matches!(r.process.next_call().await, Call::Restart(_)));
        }

        r.shutdown.cancel();
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
    }

    #[tokio::test]
    async fn test_exit_behavior_reports_status() {
        let mut r = launch(ShutdownBehavior::Exit, &[], &[]);
        r.process.next_call().await;

        r.process.exit(42);
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Exited(42));
        assert!(r.shutdown.is_cancelled());
        assert_eq!(r.process.calls(), vec![Call::Start(Env::new()), Call::Stop]);
    }

    #[tokio::test]
    async fn test_two_changes_give_two_restarts() {
        let mut r = launch(ShutdownBehavior::KeepAlive, &[], &[("FOO", "1")]);
        r.process.next_call().await;

        r.store.push_watch("/app", Ok(Node::leaf("/app/FOO", "2")));
        r.store.push_watch("/app", Ok(Node::leaf("/app/FOO", "3")));
        assert!(matches!(r.process.next_call().await, Call::Restart(_)));
        assert!(matches!(r.process.next_call().await, Call::Restart(_)));
        assert_eq!(r.store.get_calls("/app"), 3);

        r.shutdown.cancel();
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
        assert_eq!(r.process.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_unwatched_changes_are_ignored() {
        let mut r = launch(ShutdownBehavior::KeepAlive, &["FOO"], &[("FOO", "1")]);
        r.process.next_call().await;

        r.store.push_watch("/app", Ok(Node::leaf("/app/BAR", "x")));
        r.store.push_watch("/app", Ok(Node::leaf("/app/FOO", "1")));
        r.store.push_watch("/app", Ok(Node::leaf("/app/FOO", "2")));
        assert!(matches!(r.process.next_call().await, Call::Restart(_)));
        assert_eq!(r.store.get_calls("/app"), 2);

        r.shutdown.cancel();
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_stops_child() {
        let mut r = launch(ShutdownBehavior::Restart, &[], &[]);
        r.process.next_call().await;

        r.shutdown.cancel();
        assert_eq!(r.process.next_call().await, Call::Stop);
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
        r.events.wait_for(EventKind::WatcherStopped).await;
    }

    #[tokio::test]
    async fn test_fatal_fetch_error_aborts_startup() {
        let store = ScriptedStore::new();
        store.script_get(
            "/app",
            Err(StoreError::Unrecognized {
                error: "garbage".into(),
            }),
        );
        let r = launch_with(store, config(ShutdownBehavior::Exit, &[]));

        let err = r.task.await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::Store { .. }));
        assert_eq!(r.process.calls(), vec![Call::Stop]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_watchers_and_child_are_gone() {
        let cfg = EngineConfig {
            watch_retry: fast_retry(Some(1)),
            ..config(ShutdownBehavior::KeepAlive, &[])
        };
        let store = ScriptedStore::new();
        let mut r = launch_with(store, cfg);
        r.process.next_call().await;
        r.process.exit(0);
        r.events.wait_for(EventKind::ProcessExited).await;

        r.store.push_watch("/app", Err(unreachable()));
        r.store.push_watch("/app", Err(unreachable()));
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
        assert!(!r.shutdown.is_cancelled());
        assert_eq!(r.process.calls(), vec![Call::Start(Env::new())]);
    }

    #[tokio::test]
    async fn test_changes_after_shutdown_are_ignored() {
        let mut r = launch(ShutdownBehavior::KeepAlive, &[], &[("FOO", "1")]);
        r.process.next_call().await;

        r.shutdown.cancel();
        assert_eq!(r.process.next_call().await, Call::Stop);
        r.store.push_watch("/app", Ok(Node::leaf("/app/FOO", "2")));
        assert_eq!(r.task.await.unwrap().unwrap(), Outcome::Stopped);
        assert!(!r.process.calls().iter().any(|c| matches!(c, Call::Restart(_))));
    }
}
