//! Retry delay computation
//!
//! The calculator itself holds no mutable state: the caller owns a
//! [`BackoffState`] and passes it in for every decision, so a controller
//! can only ever have one computation in flight.

use crate::core::config::ReconnectConfig;
use crate::traits::{NetconfError, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Attempt bookkeeping for one reconnect controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffState {
    attempts: u64,
    last_delay: Duration,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries computed since the last reset
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn last_delay(&self) -> Duration {
        self.last_delay
    }

    /// Called after a successful connection
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_delay = Duration::ZERO;
    }
}

/// Outcome of one backoff computation
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffDecision {
    /// Wait this long, then try again; zero means retry immediately
    Retry(Duration),
    /// Stop reconnecting for the given reason
    GiveUp(NetconfError),
}

impl BackoffDecision {
    pub fn is_give_up(&self) -> bool {
        matches!(self, BackoffDecision::GiveUp(_))
    }
}

/// Exponential backoff with an optional cap, attempt limit and deadline
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffCalculator {
    min_delay: Duration,
    sleep_factor: f64,
    max_delay: Option<Duration>,
    max_attempts: Option<u64>,
    deadline: Option<Instant>,
    /// Relative deadline re-applied on every [`restart`](Self::restart)
    deadline_after: Option<Duration>,
}

impl BackoffCalculator {
    /// Create a calculator without cap, limit or deadline
    ///
    /// Factors below 1.0 (or non-finite ones) are treated as 1.0.
    pub fn new(min_delay: Duration, sleep_factor: f64) -> Self {
        let sleep_factor = if sleep_factor.is_finite() && sleep_factor >= 1.0 {
            sleep_factor
        } else {
            1.0
        };
        Self {
            min_delay,
            sleep_factor,
            max_delay: None,
            max_attempts: None,
            deadline: None,
            deadline_after: None,
        }
    }

    /// Build from configuration; a relative deadline counts from `started`
    /// until the next [`restart`](Self::restart)
    pub fn from_config(config: &ReconnectConfig, started: Instant) -> Result<Self> {
        config.validate()?;
        let mut calculator = Self::new(config.between_attempts_timeout, config.sleep_factor);
        calculator.max_delay = config.max_delay;
        calculator.max_attempts = config.max_connection_attempts;
        calculator.deadline_after = config.deadline;
        calculator.restart(started);
        Ok(calculator)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Fixed deadline, unaffected by [`restart`](Self::restart)
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self.deadline_after = None;
        self
    }

    /// Deadline `after` the given instant, moved forward on every restart
    pub fn with_deadline_after(mut self, after: Duration, now: Instant) -> Self {
        self.deadline_after = Some(after);
        self.restart(now);
        self
    }

    /// Begin a new reconnect cycle at `now`
    ///
    /// A relative deadline is measured from here on.
    pub fn restart(&mut self, now: Instant) {
        if let Some(after) = self.deadline_after {
            self.deadline = Some(now + after);
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Decide whether and when to retry
    ///
    /// `state` only advances on [`BackoffDecision::Retry`].
    pub fn next_delay(&self, state: &mut BackoffState, now: Instant) -> BackoffDecision {
        if let Some(max) = self.max_attempts {
            if state.attempts >= max {
                return BackoffDecision::GiveUp(NetconfError::ConnectionAttemptsExhausted {
                    attempts: state.attempts,
                });
            }
        }

        if let Some(deadline) = self.deadline {
            if now >= deadline {
                return BackoffDecision::GiveUp(NetconfError::DeadlinePassed);
            }
        }

        let mut delay = if state.attempts == 0 {
            self.min_delay
        } else {
            scale(state.last_delay, self.sleep_factor)
        };
        if let Some(max) = self.max_delay {
            delay = delay.min(max.max(self.min_delay));
        }

        if let Some(deadline) = self.deadline {
            let crosses = now
                .checked_add(delay)
                .map_or(true, |resume| resume >= deadline);
            if crosses {
                return BackoffDecision::GiveUp(NetconfError::DeadlineWouldBeCrossed { delay });
            }
        }

        state.attempts += 1;
        state.last_delay = delay;
        BackoffDecision::Retry(delay)
    }
}

fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Connect timeout for the next attempt, capped by the remaining deadline
pub fn connect_timeout(
    configured: Duration,
    deadline: Option<Instant>,
    now: Instant,
) -> Result<Duration> {
    match deadline {
        None => Ok(configured),
        Some(deadline) if now >= deadline => Err(NetconfError::DeadlinePassed),
        Some(deadline) => Ok(configured.min(deadline - now)),
    }
}
