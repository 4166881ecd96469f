//! # Supervisor contract.
//!
//! A [`Supervise`] implementation owns one child process at a time. Every
//! call that spawns an incarnation returns that incarnation's
//! [`ExitListener`], so the caller holds a fresh listener before it can
//! observe anything else; a listener from a replaced incarnation is simply
//! dropped.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::env::Env;
use crate::error::ProcessError;

/// Sending half of an exit notification, held by whatever waits on the child.
pub type ExitNotifier = oneshot::Sender<i32>;

/// Yields the exit status of one incarnation, at most once.
#[derive(Debug)]
pub struct ExitListener {
    rx: oneshot::Receiver<i32>,
}

impl ExitListener {
    /// Waits for the exit status.
    ///
    /// Returns `None` if the notifier was dropped without reporting (the
    /// incarnation was torn down by its supervisor).
    pub async fn wait(&mut self) -> Option<i32> {
        (&mut self.rx).await.ok()
    }
}

/// Creates a connected notifier/listener pair.
pub fn exit_channel() -> (ExitNotifier, ExitListener) {
    let (tx, rx) = oneshot::channel();
    (tx, ExitListener { rx })
}

/// # Lifecycle of one supervised child process.
///
/// Calls are serialized by the engine; implementations need no internal locking.
#[async_trait]
pub trait Supervise: Send + 'static {
    /// Spawns the child with `env` and returns its exit listener.
    async fn start(&mut self, env: &Env) -> Result<ExitListener, ProcessError>;

    /// Stops the current child (if any) and spawns a new one with `env`.
    async fn restart(&mut self, env: &Env) -> Result<ExitListener, ProcessError>;

    /// Stops the current child.
    ///
    /// Idempotent: calling it with no child running, or twice in a row, is `Ok(())`.
    async fn stop(&mut self) -> Result<(), ProcessError>;
}
