//! Retry policy for downloads.
//!
//! Only timeouts are retried. Every other failure (connection refused, bad
//! status, broken body) is reported straight away, because asking again
//! immediately rarely helps and audio hosts tend to be slow rather than
//! flaky.
//!
//! # Example
//!
//! ```
//! use kotoba_audio::download::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::with_max_attempts(3);
//!
//! match policy.should_retry(FailureType::Timeout, 1) {
//!     RetryDecision::Retry { attempt } => println!("attempt {attempt}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use tracing::debug;

/// Default number of attempts, the initial one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Smallest accepted attempt budget.
pub const MIN_ATTEMPTS: u32 = 1;

/// Largest accepted attempt budget.
pub const MAX_ATTEMPTS: u32 = 100;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The attempt ran out of time. Retried while attempts remain.
    Timeout,
    /// Anything else. Never retried.
    Other,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again immediately.
    Retry {
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// How many times a timed-out request may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget, clamped to 1..=100.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.clamp(MIN_ATTEMPTS, MAX_ATTEMPTS),
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Other {
            return RetryDecision::DoNotRetry {
                reason: "only timeouts are retried".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(attempt, next_attempt = attempt + 1, "will retry");
        RetryDecision::Retry {
            attempt: attempt + 1,
        }
    }
}

/// Classifies a transport error for retry decisions.
#[must_use]
pub fn classify_error(error: &reqwest::Error) -> FailureType {
    if error.is_timeout() {
        FailureType::Timeout
    } else {
        FailureType::Other
    }
}
