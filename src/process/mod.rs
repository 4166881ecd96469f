//! Process supervisor seam.
//!
//! ## Contents
//! - [`Supervise`]    start / restart / stop contract used by the engine
//! - [`ExitListener`] one-shot exit notification for one incarnation
//! - [`ChildProcess`] `tokio::process` implementation
//!
//! ```text
//! start(env) ──► ExitListener #1 ──► (exit status | dropped on restart/stop)
//! restart(env) ► ExitListener #2 ──► ...
//! ```

mod child;
mod supervise;

pub use child::ChildProcess;
pub use supervise::{ExitListener, ExitNotifier, Supervise, exit_channel};
