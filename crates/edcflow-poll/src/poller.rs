//! The poll loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use edcflow_core::{EdcError, ResourceKind, Result};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::policy::{Observation, PollPolicy, StateClass, TerminalStates};

/// A remote entity whose state can be read.
#[async_trait]
pub trait StateProbe: Send + Sync {
    /// What kind of entity is being observed.
    fn resource(&self) -> ResourceKind;

    /// Its remote identifier.
    fn id(&self) -> &str;

    /// Read the current state once.
    async fn observe(&self) -> Result<Observation>;
}

/// Time source for the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time via tokio.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

/// Clock that advances only when slept on. Records every sleep.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.now += duration;
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sleeps
            .clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.now += duration;
            state.sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

/// Repeatedly observes a [`StateProbe`] until it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct Poller<C: Clock = TokioClock> {
    policy: PollPolicy,
    clock: C,
}

impl Poller<TokioClock> {
    /// Create a poller on the tokio clock.
    pub fn new(policy: PollPolicy) -> Self {
        Self::with_clock(policy, TokioClock::new())
    }
}

impl<C: Clock> Poller<C> {
    /// Create a poller on a custom clock.
    pub fn with_clock(policy: PollPolicy, clock: C) -> Self {
        Self { policy, clock }
    }

    /// The active policy.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll until `terminal.success` is observed.
    ///
    /// Returns the successful observation without waiting again. Fails with
    /// [`EdcError::TerminalFailure`] on a configured failure state,
    /// [`EdcError::Timeout`] once the policy's budget is spent and
    /// [`EdcError::Cancelled`] when `cancel` fires.
    pub async fn poll<P>(
        &self,
        probe: &P,
        terminal: &TerminalStates,
        cancel: &CancelToken,
    ) -> Result<Observation>
    where
        P: StateProbe + ?Sized,
    {
        let started = self.clock.elapsed();
        let mut attempts: u32 = 0;
        let mut consecutive_errors: u32 = 0;
        let mut last_state: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(probe));
            }

            attempts += 1;
            match probe.observe().await {
                Ok(observation) => {
                    consecutive_errors = 0;
                    debug!(
                        resource = %probe.resource(),
                        id = probe.id(),
                        attempt = attempts,
                        state = %observation.state,
                        "Observed state"
                    );
                    if last_state.as_deref() != Some(observation.state.as_str()) {
                        info!("{} {} is {}", probe.resource(), probe.id(), observation.state);
                        last_state = Some(observation.state.clone());
                    }

                    match terminal.classify(&observation.state) {
                        StateClass::Success => return Ok(observation),
                        StateClass::Failure => {
                            return Err(EdcError::TerminalFailure {
                                resource: probe.resource(),
                                id: probe.id().to_string(),
                                state: observation.state,
                            })
                        }
                        StateClass::InProgress => {}
                    }
                }
                Err(err)
                    if err.is_recoverable()
                        && consecutive_errors < self.policy.max_consecutive_errors =>
                {
                    consecutive_errors += 1;
                    warn!(
                        "Transient error polling {} {} ({}/{}): {}",
                        probe.resource(),
                        probe.id(),
                        consecutive_errors,
                        self.policy.max_consecutive_errors,
                        err
                    );
                }
                Err(err) => return Err(err),
            }

            let elapsed = self.clock.elapsed().saturating_sub(started);
            let delay = self.policy.delay_for(attempts - 1);

            let attempts_spent = self.policy.max_attempts.is_some_and(|max| attempts >= max);
            let deadline_passed = self
                .policy
                .deadline
                .is_some_and(|deadline| elapsed.saturating_add(delay) > deadline);
            if attempts_spent || deadline_passed {
                return Err(EdcError::Timeout {
                    resource: probe.resource(),
                    id: probe.id().to_string(),
                    attempts,
                    elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                });
            }

            tokio::select! {
                _ = self.clock.sleep(delay) => {}
                _ = cancel.cancelled() => return Err(cancelled(probe)),
            }
        }
    }
}

fn cancelled<P: StateProbe + ?Sized>(probe: &P) -> EdcError {
    EdcError::Cancelled {
        resource: probe.resource(),
        id: probe.id().to_string(),
    }
}
