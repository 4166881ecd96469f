//! # Retry caps and per-call backoff state.
//!
//! A [`RetryPolicy`] is static configuration. Calling [`RetryPolicy::start`]
//! yields a [`Backoff`], the mutable state of one retry sequence: it counts
//! attempts, tracks elapsed time and answers "how long until the next try,
//! or stop?".
//!
//! ```text
//! fetch:  start() ─► next_delay() ─► Some(d) ... Some(d) ─► None (after max_retries)
//! watch:  start() ─► next_delay() ─► ... reset() on success ... None (after max_elapsed)
//! ```

use std::time::Duration;

use tokio::time::Instant;

use crate::policies::BackoffPolicy;

/// Backoff schedule plus the conditions under which retrying stops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// Maximum number of retries (`None` = unlimited).
    pub max_retries: Option<u32>,
    /// Maximum time since the first failure after which retrying stops (`None` = forever).
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Fetch path: three retries, then the namespace degrades to empty.
    pub fn fetch_default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            max_retries: Some(3),
            max_elapsed: None,
        }
    }

    /// Watch path: unlimited retries, stop after 15 minutes of continuous failure.
    pub fn watch_default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            max_retries: None,
            max_elapsed: Some(Duration::from_secs(15 * 60)),
        }
    }

    /// Begins a fresh retry sequence.
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 0,
            failing_since: None,
        }
    }
}

/// State of one retry sequence.
#[derive(Clone, Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
    /// Set by the first `next_delay` after a start or reset.
    failing_since: Option<Instant>,
}

impl Backoff {
    /// Returns the delay before the next retry, or `None` when retrying must stop.
    ///
    /// Each `Some` consumes one retry.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_retries {
            if self.attempt >= max {
                return None;
            }
        }
        let failing_since = *self.failing_since.get_or_insert_with(Instant::now);
        if let Some(limit) = self.policy.max_elapsed {
            if failing_since.elapsed() >= limit {
                return None;
            }
        }
        let delay = self.policy.backoff.next(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    /// Number of retries handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Forgets previous failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.failing_since = None;
    }
}
