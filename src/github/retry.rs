//! Retry policy for GitHub API calls.
//!
//! The questions answered here are pure functions of the error, the attempt
//! index and the clock:
//!
//! - [`is_retryable`]: will retrying this failure plausibly help?
//! - [`RetryOptions::delay_for_attempt`]: how long to back off before the next try.
//! - [`RetryBudget::next`]: give up, wait for a rate-limit reset, or back off.
//!
//! The executor owns the attempt loop and performs the sleeps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::GitHubError;

/// Rate-limit resets further out than this are not trusted; the executor falls
/// back to exponential backoff instead.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5 * 60);

/// Backoff configuration for one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Maximum number of retries (not including the initial attempt).
    pub max_retries: u32,

    /// Delay before the first backoff retry.
    pub base_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,

    /// Multiplier per backoff step. Expected to be greater than 1.
    pub backoff_factor: f64,

    /// How many times one call may sleep until a server-declared rate-limit
    /// reset. Further rate-limit failures back off exponentially instead.
    pub rate_limit_retries: u32,
}

impl RetryOptions {
    /// Client-wide defaults: 3 retries, 1s base, 30s cap, factor 2.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        base_delay: Duration::from_millis(1000),
        max_delay: Duration::from_millis(30_000),
        backoff_factor: 2.0,
        rate_limit_retries: 3,
    };

    /// A single attempt, no retries.
    pub const NO_RETRY: Self = Self {
        max_retries: 0,
        ..Self::DEFAULT
    };

    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_factor,
            rate_limit_retries: Self::DEFAULT.rate_limit_retries,
        }
    }

    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    pub fn with_rate_limit_retries(self, rate_limit_retries: u32) -> Self {
        Self {
            rate_limit_retries,
            ..self
        }
    }

    /// Computes the backoff delay for the given step (0-indexed).
    ///
    /// `base_delay * backoff_factor^step`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, step: u32) -> Duration {
        let multiplier = self.backoff_factor.powi(step.min(i32::MAX as u32) as i32);
        let delay_secs = self.base_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        if capped_secs.is_finite() && capped_secs >= 0.0 {
            Duration::from_secs_f64(capped_secs)
        } else {
            self.max_delay
        }
    }

    /// Returns an iterator over the backoff delays for every retry.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|step| self.delay_for_attempt(step))
    }

    /// Total wait if every retry backs off.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whether a failure may succeed on retry.
///
/// Server errors, rate limits and network failures are transient. Everything
/// else is a condition the caller must fix; unclassified errors are not
/// assumed transient.
pub fn is_retryable(error: &GitHubError) -> bool {
    match error {
        GitHubError::ServerError { .. }
        | GitHubError::RateLimit { .. }
        | GitHubError::Network { .. } => true,
        GitHubError::Authentication
        | GitHubError::Permission { .. }
        | GitHubError::NotFound { .. }
        | GitHubError::Validation { .. }
        | GitHubError::Unknown { .. } => false,
    }
}

/// What the executor should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the error to the caller.
    GiveUp,
    /// Sleep until the server-declared rate-limit reset, then retry.
    WaitForReset(Duration),
    /// Sleep for an exponential-backoff delay, then retry.
    Backoff(Duration),
}

/// Per-call retry bookkeeping.
///
/// Each `execute` call owns one budget, so concurrent calls never share
/// attempt counters. Rate-limit waits do not advance the backoff step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryBudget {
    backoff_steps: u32,
    rate_limit_waits: u32,
}

impl RetryBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides what to do after `attempt` (0-indexed) failed with `error`.
    ///
    /// The last allowed attempt and non-retryable errors give up. A rate limit
    /// whose reset lies strictly between `now` and [`MAX_RATE_LIMIT_WAIT`] from
    /// now is waited out exactly, while the per-call rate-limit budget lasts.
    /// Everything else backs off exponentially.
    pub fn next(
        &mut self,
        error: &GitHubError,
        attempt: u32,
        options: &RetryOptions,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        if attempt >= options.max_retries || !is_retryable(error) {
            return RetryDecision::GiveUp;
        }

        if let GitHubError::RateLimit {
            reset_time: Some(reset),
        } = error
        {
            if self.rate_limit_waits < options.rate_limit_retries {
                if let Ok(wait) = (*reset - now).to_std() {
                    if !wait.is_zero() && wait < MAX_RATE_LIMIT_WAIT {
                        self.rate_limit_waits += 1;
                        return RetryDecision::WaitForReset(wait);
                    }
                }
            }
        }

        let delay = options.delay_for_attempt(self.backoff_steps);
        self.backoff_steps += 1;
        RetryDecision::Backoff(delay)
    }
}
