//! In-crate fakes for the store and process seams.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    env::Env,
    error::{ProcessError, StoreError},
    events::{Event, EventKind},
    policies::{BackoffPolicy, JitterPolicy, RetryPolicy},
    process::{ExitListener, ExitNotifier, Supervise, exit_channel},
    store::{KvStore, Node},
    subscribers::Subscribe,
};

pub(crate) fn fast_retry(max_retries: Option<u32>) -> RetryPolicy {
    RetryPolicy {
        backoff: BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_millis(100),
            factor: 2.0,
            jitter: JitterPolicy::None,
        },
        max_retries,
        max_elapsed: None,
    }
}

pub(crate) fn unreachable() -> StoreError {
    StoreError::Unreachable {
        error: "connection refused".into(),
    }
}

type WatchResult = Result<Node, StoreError>;
type WatchQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<WatchResult>>>;

#[derive(Default)]
struct StoreState {
    values: HashMap<String, Vec<Node>>,
    scripted: HashMap<String, VecDeque<Result<Vec<Node>, StoreError>>>,
    get_calls: HashMap<String, usize>,
    watch_calls: HashMap<String, usize>,
    watches: HashMap<String, (mpsc::UnboundedSender<WatchResult>, WatchQueue)>,
}

/// Store whose reads come from a script first, then from current contents.
/// Watches block until a result is pushed or the call is cancelled.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    state: Mutex<StoreState>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets `name` under `namespace` in the current contents.
    pub(crate) fn set(&self, namespace: &str, name: &str, value: &str) {
        let key = format!("{namespace}/{name}");
        let mut st = self.state.lock().unwrap();
        let nodes = st.values.entry(namespace.to_string()).or_default();
        match nodes.iter_mut().find(|n| n.key == key) {
            Some(node) => node.value = value.to_string(),
            None => nodes.push(Node::leaf(key, value)),
        }
    }

    /// Queues a one-off reply for the next `get(namespace)`.
    pub(crate) fn script_get(&self, namespace: &str, reply: Result<Vec<Node>, StoreError>) {
        let mut st = self.state.lock().unwrap();
        st.scripted
            .entry(namespace.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Completes the next (or a pending) `watch(namespace)`.
    pub(crate) fn push_watch(&self, namespace: &str, reply: WatchResult) {
        let tx = self.watch_queue(namespace).0;
        tx.send(reply).unwrap();
    }

    pub(crate) fn get_calls(&self, namespace: &str) -> usize {
        let st = self.state.lock().unwrap();
        st.get_calls.get(namespace).copied().unwrap_or(0)
    }

    pub(crate) fn watch_calls(&self, namespace: &str) -> usize {
        let st = self.state.lock().unwrap();
        st.watch_calls.get(namespace).copied().unwrap_or(0)
    }

    fn watch_queue(&self, namespace: &str) -> (mpsc::UnboundedSender<WatchResult>, WatchQueue) {
        let mut st = self.state.lock().unwrap();
        let (tx, rx) = st
            .watches
            .entry(namespace.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                (tx, Arc::new(tokio::sync::Mutex::new(rx)))
            });
        (tx.clone(), rx.clone())
    }
}

#[async_trait]
impl KvStore for ScriptedStore {
    async fn get(&self, namespace: &str) -> Result<Vec<Node>, StoreError> {
        let mut st = self.state.lock().unwrap();
        *st.get_calls.entry(namespace.to_string()).or_default() += 1;
        if let Some(reply) = st.scripted.get_mut(namespace).and_then(VecDeque::pop_front) {
            return reply;
        }
        Ok(st.values.get(namespace).cloned().unwrap_or_default())
    }

    async fn watch(&self, namespace: &str, cancel: &CancellationToken) -> Result<Node, StoreError> {
        {
            let mut st = self.state.lock().unwrap();
            *st.watch_calls.entry(namespace.to_string()).or_default() += 1;
        }
        let queue = self.watch_queue(namespace).1;
        let mut rx = queue.lock().await;
        tokio::select! {
            Some(reply) = rx.recv() => reply,
            _ = cancel.cancelled() => Err(StoreError::Unreachable { error: "cancelled".into() }),
        }
    }
}

/// One recorded supervisor call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Start(Env),
    Restart(Env),
    Stop,
}

/// Test-side handle of a [`RecordingProcess`].
pub(crate) struct ProcessHandle {
    calls: mpsc::UnboundedReceiver<Call>,
    log: Arc<Mutex<Vec<Call>>>,
    notifier: Arc<Mutex<Option<ExitNotifier>>>,
}

impl ProcessHandle {
    /// Waits for the next supervisor call.
    pub(crate) async fn next_call(&mut self) -> Call {
        self.calls.recv().await.expect("process dropped")
    }

    /// Makes the current incarnation exit with `status`.
    pub(crate) fn exit(&self, status: i32) {
        let tx = self
            .notifier
            .lock()
            .unwrap()
            .take()
            .expect("no running incarnation");
        tx.send(status).unwrap();
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }
}

/// Supervisor that records every call and lets the test fire exits.
pub(crate) struct RecordingProcess {
    calls: mpsc::UnboundedSender<Call>,
    log: Arc<Mutex<Vec<Call>>>,
    notifier: Arc<Mutex<Option<ExitNotifier>>>,
}

impl RecordingProcess {
    pub(crate) fn new() -> (Self, ProcessHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let notifier = Arc::new(Mutex::new(None));
        (
            Self {
                calls: tx,
                log: log.clone(),
                notifier: notifier.clone(),
            },
            ProcessHandle {
                calls: rx,
                log,
                notifier,
            },
        )
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call.clone());
        let _ = self.calls.send(call);
    }

    fn arm(&self) -> ExitListener {
        let (tx, rx) = exit_channel();
        *self.notifier.lock().unwrap() = Some(tx);
        rx
    }
}

#[async_trait]
impl Supervise for RecordingProcess {
    async fn start(&mut self, env: &Env) -> Result<ExitListener, ProcessError> {
        let listener = self.arm();
        self.record(Call::Start(env.clone()));
        Ok(listener)
    }

    async fn restart(&mut self, env: &Env) -> Result<ExitListener, ProcessError> {
        let listener = self.arm();
        self.record(Call::Restart(env.clone()));
        Ok(listener)
    }

    async fn stop(&mut self) -> Result<(), ProcessError> {
        self.notifier.lock().unwrap().take();
        self.record(Call::Stop);
        Ok(())
    }
}

/// Subscriber that forwards every event kind to an [`EventLog`].
pub(crate) struct EventRecorder {
    tx: mpsc::UnboundedSender<EventKind>,
}

impl EventRecorder {
    pub(crate) fn new() -> (Self, EventLog) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventLog { rx })
    }
}

#[async_trait]
impl Subscribe for EventRecorder {
    async fn on_event(&self, event: &Event) {
        let _ = self.tx.send(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

pub(crate) struct EventLog {
    rx: mpsc::UnboundedReceiver<EventKind>,
}

impl EventLog {
    /// Consumes recorded events until one of `kind` shows up.
    pub(crate) async fn wait_for(&mut self, kind: EventKind) {
        while let Some(seen) = self.rx.recv().await {
            if seen == kind {
                return;
            }
        }
        panic!("event stream ended before {kind:?}");
    }
}
