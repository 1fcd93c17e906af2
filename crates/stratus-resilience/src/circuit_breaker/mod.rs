//! Circuit breaker implementation.
//!
//! The breaker keeps a count-based sliding window of the most recent recorded
//! outcomes. Once the window holds at least `minimum_calls` outcomes and the
//! failure rate reaches `failure_rate_threshold`, the circuit opens and calls
//! fail fast with [`FetchError::CircuitOpen`]. After `open_duration` a limited
//! number of trial calls are admitted (half-open); the first recorded trial
//! outcome decides whether the circuit closes again or reopens.
//!
//! Every admitted call carries the generation of the phase that admitted it.
//! Outcomes reported for an older generation are discarded, so a slow call
//! admitted before a transition cannot move the new phase.

use crate::metrics::ResilienceMetrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use stratus_core::{FailureKind, FetchError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed - requests are allowed.
    Closed,
    /// Circuit is open - requests are rejected.
    Open,
    /// Circuit is half-open - limited trial requests are allowed.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of recent outcomes kept in the window.
    pub sliding_window_size: usize,
    /// Outcomes required before the failure rate is evaluated.
    pub minimum_calls: usize,
    /// Failure rate in percent at which the circuit opens.
    pub failure_rate_threshold: f64,
    /// Time spent open before trial calls are admitted.
    pub open_duration: Duration,
    /// Trial calls admitted while half-open.
    pub permitted_calls_in_half_open: u32,
    /// Failure kinds recorded in the window. Other kinds are not recorded at all.
    pub record_failures: HashSet<FailureKind>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 2,
            minimum_calls: 2,
            failure_rate_threshold: 100.0,
            open_duration: Duration::from_secs(10),
            permitted_calls_in_half_open: 1,
            record_failures: FailureKind::all()
                .into_iter()
                .filter(FailureKind::counts_as_failure_by_default)
                .collect(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Returns true if failures of this kind are recorded.
    #[must_use]
    pub fn records(&self, kind: FailureKind) -> bool {
        self.record_failures.contains(&kind)
    }
}

/// Guard for one call admitted by the breaker.
///
/// Pass it to [`CircuitBreaker::on_success`] or [`CircuitBreaker::on_failure`].
/// A half-open trial permit dropped without an outcome (the call was cancelled)
/// gives its trial slot back.
#[must_use = "an admitted call must report its outcome"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl fmt::Debug for CallPermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.name)
            .field("generation", &self.generation)
            .field("trial", &self.trial)
            .finish()
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.generation, self.trial);
        }
    }
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Outcomes in the window.
    pub buffered_calls: usize,
    /// Failures in the window.
    pub failed_calls: usize,
    /// Failure rate in percent, once `minimum_calls` outcomes are buffered.
    pub failure_rate: Option<f64>,
    /// Time left before trial calls are admitted, while open.
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    // true = failure
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_issued: u32,
    generation: u64,
}

/// Circuit breaker for protecting against cascading failures.
///
/// One instance is shared by all concurrent callers of a logical operation.
/// State is guarded by a synchronous mutex that is never held across an await.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_issued: 0,
                generation: 0,
            }),
        }
    }

    /// Creates a new circuit breaker with default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Returns the name of the circuit breaker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the current state of the circuit breaker.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner, Instant::now());
        inner.state
    }

    /// Asks for permission to call the protected dependency.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, FetchError> {
        let mut inner = self.inner.lock();
        self.maybe_half_open(&mut inner, Instant::now());

        match inner.state {
            CircuitState::Closed => Ok(self.permit(inner.generation, false)),
            CircuitState::HalfOpen
                if inner.half_open_issued < self.config.permitted_calls_in_half_open =>
            {
                inner.half_open_issued += 1;
                debug!(
                    breaker = %self.name,
                    trial = inner.half_open_issued,
                    "Admitting trial call"
                );
                Ok(self.permit(inner.generation, true))
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                drop(inner);
                ResilienceMetrics::circuit_rejected(&self.name);
                Err(FetchError::CircuitOpen(self.name.clone()))
            }
        }
    }

    /// Reports a successful call.
    pub fn on_success(&self, mut permit: CallPermit<'_>) {
        permit.settled = true;
        self.record(&permit, None);
    }

    /// Reports a failed call.
    pub fn on_failure(&self, mut permit: CallPermit<'_>, kind: FailureKind) {
        permit.settled = true;
        self.record(&permit, Some(kind));
    }

    /// Executes a function with circuit breaker protection.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let permit = self.try_acquire()?;

        match f().await {
            Ok(value) => {
                self.on_success(permit);
                Ok(value)
            }
            Err(e) => {
                self.on_failure(permit, e.kind());
                Err(e)
            }
        }
    }

    /// Returns a diagnostic snapshot.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        self.maybe_half_open(&mut inner, now);

        let open_remaining = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                Some(self.config.open_duration.saturating_sub(now - opened_at))
            }
            _ => None,
        };

        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            buffered_calls: inner.window.len(),
            failed_calls: inner.window.iter().filter(|failed| **failed).count(),
            failure_rate: self.failure_rate(&inner.window),
            open_remaining,
        }
    }

    /// Manually resets the circuit breaker to closed state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed, Instant::now());
        debug!("Circuit breaker '{}' manually reset", self.name);
    }

    fn permit(&self, generation: u64, trial: bool) -> CallPermit<'_> {
        CallPermit {
            breaker: self,
            generation,
            trial,
            settled: false,
        }
    }

    fn release(&self, generation: u64, trial: bool) {
        let mut inner = self.inner.lock();
        if trial && generation == inner.generation && inner.state == CircuitState::HalfOpen {
            inner.half_open_issued = inner.half_open_issued.saturating_sub(1);
            debug!(breaker = %self.name, "Trial call abandoned, releasing its slot");
        }
    }

    fn record(&self, permit: &CallPermit<'_>, failure: Option<FailureKind>) {
        let mut inner = self.inner.lock();

        if permit.generation != inner.generation {
            debug!(
                breaker = %self.name,
                "Discarding outcome from a superseded circuit phase"
            );
            return;
        }

        if let Some(kind) = failure {
            if !self.config.records(kind) {
                if inner.state == CircuitState::HalfOpen {
                    inner.half_open_issued = inner.half_open_issued.saturating_sub(1);
                }
                debug!(breaker = %self.name, %kind, "Failure kind not recorded");
                return;
            }
        }

        let failed = failure.is_some();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back(failed);
                while inner.window.len() > self.config.sliding_window_size {
                    inner.window.pop_front();
                }

                if let Some(rate) = self.failure_rate(&inner.window) {
                    if rate >= self.config.failure_rate_threshold {
                        warn!(
                            "Circuit breaker '{}' opened at failure rate {:.1}% over {} calls",
                            self.name,
                            rate,
                            inner.window.len()
                        );
                        self.transition(&mut inner, CircuitState::Open, now);
                    }
                }
            }
            CircuitState::HalfOpen => {
                if failed {
                    warn!(
                        "Circuit breaker '{}' reopened after failure in half-open state",
                        self.name
                    );
                    self.transition(&mut inner, CircuitState::Open, now);
                } else {
                    info!(
                        "Circuit breaker '{}' closed after successful recovery",
                        self.name
                    );
                    self.transition(&mut inner, CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn failure_rate(&self, window: &VecDeque<bool>) -> Option<f64> {
        if window.is_empty() || window.len() < self.config.minimum_calls {
            return None;
        }
        let failures = window.iter().filter(|failed| **failed).count();
        Some(failures as f64 * 100.0 / window.len() as f64)
    }

    fn maybe_half_open(&self, inner: &mut Inner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        if let Some(opened_at) = inner.opened_at {
            if now.duration_since(opened_at) >= self.config.open_duration {
                debug!("Circuit breaker '{}' transitioning to half-open", self.name);
                self.transition(inner, CircuitState::HalfOpen, now);
            }
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, now: Instant) {
        inner.state = to;
        inner.generation += 1;
        inner.half_open_issued = 0;
        inner.window.clear();
        inner.opened_at = (to == CircuitState::Open).then_some(now);
        ResilienceMetrics::circuit_transition(&self.name, &to.to_string());
    }
}
