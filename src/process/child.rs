//! # Child process supervisor backed by `tokio::process`.
//!
//! Each incarnation runs under a small waiter task that owns the
//! [`Child`](tokio::process::Child):
//! ```text
//! spawn ─► waiter: select {
//!            child.wait()     ─► notify ExitListener(status)
//!            stop.cancelled() ─► SIGTERM ─► wait(grace) ─► SIGKILL ─► (no notification)
//!          }
//! ```
//!
//! The child inherits the parent environment, overlaid with the snapshot.
//! An incarnation the supervisor tears down itself never reports an exit.

use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::env::Env;
use crate::error::ProcessError;
use crate::process::supervise::{ExitListener, Supervise, exit_channel};

struct Incarnation {
    pid: Option<u32>,
    stop: CancellationToken,
    waiter: JoinHandle<()>,
}

/// Supervises one OS process at a time.
pub struct ChildProcess {
    command: Vec<String>,
    grace: Duration,
    current: Option<Incarnation>,
}

impl ChildProcess {
    /// `command[0]` is the program, the rest its arguments. `grace` bounds the
    /// wait between SIGTERM and SIGKILL on stop.
    pub fn new(command: Vec<String>, grace: Duration) -> Self {
        Self {
            command,
            grace,
            current: None,
        }
    }

    /// Pid of the running incarnation, if any.
    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().and_then(|c| c.pid)
    }

    fn spawn(&mut self, env: &Env) -> Result<ExitListener, ProcessError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(ProcessError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .envs(env)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        let stop = CancellationToken::new();
        let (notifier, listener) = exit_channel();
        let grace = self.grace;
        let token = stop.clone();

        let waiter = tokio::spawn(async move {
            let exited = tokio::select! {
                res = child.wait() => Some(res),
                _ = token.cancelled() => None,
            };

            match exited {
                Some(Ok(status)) => {
                    let _ = notifier.send(exit_code(status));
                }
                Some(Err(e)) => {
                    tracing::error!(pid, error = %e, "waiting on child failed");
                    let _ = notifier.send(-1);
                }
                None => {
                    if let Err(e) = terminate(&mut child, pid, grace).await {
                        tracing::warn!(pid, error = %e, "terminating child failed");
                    }
                }
            }
        });

        tracing::debug!(pid, program = %program, "child spawned");
        self.current = Some(Incarnation { pid, stop, waiter });
        Ok(listener)
    }
}

#[async_trait]
impl Supervise for ChildProcess {
    async fn start(&mut self, env: &Env) -> Result<ExitListener, ProcessError> {
        self.stop().await?;
        self.spawn(env)
    }

    async fn restart(&mut self, env: &Env) -> Result<ExitListener, ProcessError> {
        self.stop().await?;
        self.spawn(env)
    }

    async fn stop(&mut self) -> Result<(), ProcessError> {
        if let Some(inc) = self.current.take() {
            inc.stop.cancel();
            if let Err(e) = inc.waiter.await {
                tracing::warn!(pid = inc.pid, error = %e, "child waiter aborted");
            }
        }
        Ok(())
    }
}

/// SIGTERM, then SIGKILL once `grace` runs out.
async fn terminate(
    child: &mut Child,
    pid: Option<u32>,
    grace: Duration,
) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // SAFETY: plain syscall on a pid we spawned and have not reaped yet.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            tracing::debug!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    match time::timeout(grace, child.wait()).await {
        Ok(res) => res,
        Err(_elapsed) => {
            child.kill().await?;
            child.wait().await
        }
    }
}

/// Exit code, or `128 + signal` for a signal death (shell convention).
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ChildProcess {
        ChildProcess::new(
            vec!["sh".into(), "-c".into(), script.into()],
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_reports_exit_status() {
        let mut p = sh("exit 3");
        let mut exit = p.start(&Env::new()).await.unwrap();
        assert_eq!(exit.wait().await, Some(3));
    }

    #[tokio::test]
    async fn test_child_sees_snapshot() {
        let mut env = Env::new();
        env.insert("ETCDENV_TEST_FOO".into(), "bar".into());
        let mut p = sh(r#"test "$ETCDENV_TEST_FOO" = bar"#);
        let mut exit = p.start(&env).await.unwrap();
        assert_eq!(exit.wait().await, Some(0));
    }

    #[tokio::test]
    async fn test_stop_is_silent_and_idempotent() {
        let mut p = sh("sleep 30");
        let mut exit = p.start(&Env::new()).await.unwrap();
        assert!(p.pid().is_some());

        p.stop().await.unwrap();
        assert_eq!(exit.wait().await, None);
        assert!(p.pid().is_none());
        p.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_replaces_incarnation() {
        let mut p = sh("sleep 30");
        let mut first = p.start(&Env::new()).await.unwrap();
        let first_pid = p.pid();

        let _second = p.restart(&Env::new()).await.unwrap();
        assert_eq!(first.wait().await, None);
        assert_ne!(p.pid(), first_pid);
        p.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let mut p = ChildProcess::new(Vec::new(), Duration::from_secs(1));
        let err = p.start(&Env::new()).await.unwrap_err();
        assert!(matches!(err, ProcessError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let mut p = ChildProcess::new(
            vec!["/nonexistent/etcdenv-test-binary".into()],
            Duration::from_secs(1),
        );
        let err = p.start(&Env::new()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
