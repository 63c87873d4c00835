//! Retry policy and per-call attempt bookkeeping.
//!
//! A dispatch call moves through `Idle -> Attempting -> {Succeeded | Exhausted}`.
//! [`AttemptState`] tracks the `Attempting` part: how many attempts have
//! failed, the last transport error, and whether the budget is spent.

use std::time::Duration;

use crate::error::MailError;

/// Default backoff unit: delays are `2^n` seconds.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Bounded exponential backoff without jitter or cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    unit: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` attempts in total.
    ///
    /// Zero attempts is a configuration error: nothing would ever be sent.
    pub fn new(max_attempts: u32, unit: Duration) -> Result<Self, MailError> {
        if max_attempts == 0 {
            return Err(MailError::Configuration(
                "retry limit must be at least 1".into(),
            ));
        }
        Ok(Self { max_attempts, unit })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry `n` (1-indexed): `unit * 2^n`.
    ///
    /// Saturates at [`Duration::MAX`] rather than overflowing.
    ///
    /// ```
    /// use std::time::Duration;
    /// use courier::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_secs(1)).unwrap();
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    /// assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.unit.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// What the dispatcher should do after a failed attempt.
#[derive(Debug)]
pub(crate) enum Step {
    /// Sleep for `delay`, then attempt again.
    Retry { delay: Duration },
    /// Budget spent; return this terminal error.
    Exhausted(MailError),
}

/// Attempt counter for one dispatch call.
#[derive(Debug)]
pub(crate) struct AttemptState {
    policy: RetryPolicy,
    attempt_number: u32,
    last_error: Option<MailError>,
}

impl AttemptState {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt_number: 0,
            last_error: None,
        }
    }

    /// Failed attempts so far.
    pub(crate) fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    pub(crate) fn last_error(&self) -> Option<&MailError> {
        self.last_error.as_ref()
    }

    /// Record a transient failure and decide the next step.
    pub(crate) fn record_failure(&mut self, error: MailError) -> Step {
        self.attempt_number += 1;

        if self.attempt_number >= self.policy.max_attempts {
            self.last_error = Some(error.clone());
            return Step::Exhausted(MailError::delivery_failed(self.attempt_number, error));
        }

        self.last_error = Some(error);
        Step::Retry {
            delay: self.policy.delay_for(self.attempt_number),
        }
    }
}
