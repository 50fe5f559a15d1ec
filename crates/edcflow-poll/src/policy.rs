//! Poll budgets and terminal-state classification.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal success state of a contract negotiation.
pub const NEGOTIATION_FINALIZED: &str = "FINALIZED";

/// Terminal success state of a transfer process.
pub const TRANSFER_COMPLETED: &str = "COMPLETED";

/// How often and for how long to poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second attempt.
    pub interval: Duration,

    /// Give up after this many observations.
    pub max_attempts: Option<u32>,

    /// Give up once this much time has passed since the first attempt.
    pub deadline: Option<Duration>,

    /// Growth factor applied to the delay after every attempt.
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay.
    pub max_interval: Duration,

    /// Transient transport errors tolerated in a row before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
            deadline: Some(Duration::from_secs(300)),
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(30),
            max_consecutive_errors: 3,
        }
    }
}

impl PollPolicy {
    /// Poll once per second forever, failing on the first error.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            deadline: None,
            max_consecutive_errors: 0,
            ..Self::default()
        }
    }

    /// Set the base interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Cap the number of observations.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Cap the total time spent polling.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Grow the delay by `multiplier` per attempt, up to `max_interval`.
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    /// Tolerate this many transport errors in a row.
    pub fn with_max_consecutive_errors(mut self, errors: u32) -> Self {
        self.max_consecutive_errors = errors;
        self
    }

    /// Delay to wait after the zero-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.max(1.0);
        if multiplier == 1.0 {
            return self.interval;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let cap = self.max_interval.max(self.interval);
        let secs = self.interval.as_secs_f64() * multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(cap, |delay| delay.min(cap))
    }
}

/// Outcome class of an observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Success,
    Failure,
    InProgress,
}

/// The state strings that end polling.
///
/// The connector's failure states are not discoverable, so they are
/// supplied by configuration; anything else keeps the poll going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStates {
    pub success: String,
    #[serde(default)]
    pub failure: BTreeSet<String>,
}

impl TerminalStates {
    /// Only `success` ends polling.
    pub fn success_only(success: impl Into<String>) -> Self {
        Self {
            success: success.into(),
            failure: BTreeSet::new(),
        }
    }

    /// Negotiations end at `FINALIZED`.
    pub fn negotiation() -> Self {
        Self::success_only(NEGOTIATION_FINALIZED)
    }

    /// Transfers end at `COMPLETED`.
    pub fn transfer() -> Self {
        Self::success_only(TRANSFER_COMPLETED)
    }

    /// Add failure states.
    pub fn with_failures<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure.extend(states.into_iter().map(Into::into));
        self
    }

    /// Classify an observed state by exact string equality.
    pub fn classify(&self, state: &str) -> StateClass {
        if state == self.success {
            StateClass::Success
        } else if self.failure.contains(state) {
            StateClass::Failure
        } else {
            StateClass::InProgress
        }
    }
}

/// One GET of a polled resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub state: String,
    /// Full response body, for extracting fields once terminal.
    pub body: serde_json::Value,
}
