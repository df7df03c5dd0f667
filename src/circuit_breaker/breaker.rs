use super::types::{BreakerMetrics, CircuitState};
use crate::config::{validate_threshold, BreakerConfig};
use crate::error::{BreakerError, Failure, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker guarding a single protected operation
pub struct CircuitBreaker<F, E> {
    /// Breaker identifier, used in logs
    name: String,
    /// The protected operation
    operation: F,
    /// Failures tolerated before the circuit opens
    failure_threshold: usize,
    /// Time the circuit stays open before probes are let through
    half_open_timeout: Duration,
    /// Deadline for a single call
    call_timeout: Option<Duration>,
    /// Failure record, failure clock and metrics
    state: Mutex<State<E>>,
}

struct State<E> {
    /// Failures since the last success, oldest first
    failures: Vec<Arc<Failure<E>>>,
    /// Time of the most recent failure, `None` while the clock is inactive
    last_failure: Option<Instant>,
    /// Metrics
    metrics: BreakerMetrics,
}

impl<E> State<E> {
    fn new() -> Self {
        Self {
            failures: Vec::new(),
            last_failure: None,
            metrics: BreakerMetrics::default(),
        }
    }

    fn since_last_failure(&self) -> Option<Duration> {
        self.last_failure.map(|at| at.elapsed())
    }
}

/// Holds the lock while the operation runs.
///
/// Dropping it while still armed means the caller abandoned the attempt, which is
/// recorded as a `Failure::Cancelled`.
struct InFlight<'a, F, E> {
    breaker: &'a CircuitBreaker<F, E>,
    state: MutexGuard<'a, State<E>>,
    gate: CircuitState,
    armed: bool,
}

impl<F, E> Drop for InFlight<'_, F, E> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker
                .commit_failure(&mut self.state, self.gate, Arc::new(Failure::Cancelled));
        }
    }
}

impl<F, Fut, T, E> CircuitBreaker<F, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    /// Create a new circuit breaker.
    ///
    /// A negative `failure_threshold` is rejected; `0` opens the circuit on the first failure.
    pub fn new(operation: F, failure_threshold: i64, half_open_timeout: Duration) -> Result<Self> {
        let failure_threshold = validate_threshold(failure_threshold)?;
        Ok(Self::build(
            "default".to_string(),
            operation,
            failure_threshold,
            half_open_timeout,
            None,
        ))
    }

    /// Create a circuit breaker from a validated configuration
    pub fn from_config(operation: F, config: &BreakerConfig) -> Result<Self> {
        config.validate()?;
        let failure_threshold = validate_threshold(config.failure_threshold)?;
        Ok(Self::build(
            config.name.clone(),
            operation,
            failure_threshold,
            config.half_open_timeout(),
            config.call_timeout(),
        ))
    }

    fn build(
        name: String,
        operation: F,
        failure_threshold: usize,
        half_open_timeout: Duration,
        call_timeout: Option<Duration>,
    ) -> Self {
        info!(
            breaker = %name,
            failure_threshold,
            half_open_timeout = ?half_open_timeout,
            call_timeout = ?call_timeout,
            "Creating circuit breaker"
        );

        Self {
            name,
            operation,
            failure_threshold,
            half_open_timeout,
            call_timeout,
            state: Mutex::new(State::new()),
        }
    }

    /// Call the protected operation through the circuit.
    ///
    /// Returns `CircuitOpen` without calling the operation while the circuit is open,
    /// and also when this call's failure opens it. A failure that leaves the circuit
    /// closed comes back as `OperationFailed`.
    pub async fn attempt(&self) -> std::result::Result<T, BreakerError<E>> {
        let mut state = self.state.lock().await;
        state.metrics.total_requests += 1;

        let gate = self.evaluate(&state);
        match gate {
            CircuitState::Open => {
                state.metrics.rejected_requests += 1;
                debug!(
                    breaker = %self.name,
                    failures = state.failures.len(),
                    "Circuit breaker open, rejecting request"
                );
                return Err(BreakerError::CircuitOpen {
                    causes: state.failures.clone(),
                });
            }
            CircuitState::HalfOpen => {
                debug!(
                    breaker = %self.name,
                    failures = state.failures.len(),
                    "Allowing half-open probe request"
                );
            }
            CircuitState::Closed => {}
        }

        let mut call = InFlight {
            breaker: self,
            state,
            gate,
            armed: true,
        };
        let outcome = self.invoke().await;
        call.armed = false;

        match outcome {
            Ok(value) => {
                self.commit_success(&mut call.state, gate);
                Ok(value)
            }
            Err(failure) => {
                let failure = Arc::new(failure);
                match self.commit_failure(&mut call.state, gate, failure.clone()) {
                    CircuitState::Open => Err(BreakerError::CircuitOpen {
                        causes: call.state.failures.clone(),
                    }),
                    _ => Err(BreakerError::OperationFailed(failure)),
                }
            }
        }
    }

    async fn invoke(&self) -> std::result::Result<T, Failure<E>> {
        match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, (self.operation)()).await {
                Ok(result) => result.map_err(Failure::Operation),
                Err(_) => Err(Failure::TimedOut(limit)),
            },
            None => (self.operation)().await.map_err(Failure::Operation),
        }
    }
}

impl<F, E> CircuitBreaker<F, E> {
    /// Set the name used in log lines
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fail calls that take longer than `limit`
    pub fn with_call_timeout(mut self, limit: Duration) -> Self {
        self.call_timeout = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    pub fn half_open_timeout(&self) -> Duration {
        self.half_open_timeout
    }

    /// Number of failures recorded since the last success
    pub async fn failure_count(&self) -> usize {
        self.state.lock().await.failures.len()
    }

    /// Get current state
    pub async fn state(&self) -> CircuitState {
        let state = self.state.lock().await;
        self.evaluate(&state)
    }

    /// Failures recorded since the last success, oldest first
    pub async fn failures(&self) -> Vec<Arc<Failure<E>>> {
        self.state.lock().await.failures.clone()
    }

    /// Get metrics
    pub async fn metrics(&self) -> BreakerMetrics {
        self.state.lock().await.metrics.clone()
    }

    fn evaluate(&self, state: &State<E>) -> CircuitState {
        CircuitState::evaluate(
            state.failures.len(),
            self.failure_threshold,
            state.since_last_failure(),
            self.half_open_timeout,
        )
    }

    fn commit_success(&self, state: &mut State<E>, gate: CircuitState) {
        state.metrics.successful_requests += 1;

        if gate == CircuitState::HalfOpen {
            info!(
                breaker = %self.name,
                failures = state.failures.len(),
                "Half-open probe succeeded, closing circuit"
            );
            state.metrics.circuit_closed_count += 1;
        }

        state.failures.clear();
        state.last_failure = None;
    }

    /// Record a failure, restart the failure clock and return the resulting state
    fn commit_failure(
        &self,
        state: &mut State<E>,
        gate: CircuitState,
        failure: Arc<Failure<E>>,
    ) -> CircuitState {
        state.metrics.failed_requests += 1;
        match *failure {
            Failure::TimedOut(_) => state.metrics.timeout_count += 1,
            Failure::Cancelled => state.metrics.cancelled_count += 1,
            Failure::Operation(_) => {}
        }

        state.failures.push(failure);
        state.last_failure = Some(Instant::now());

        let next = self.evaluate(state);
        if next == CircuitState::Open {
            state.metrics.circuit_opened_count += 1;
            if gate == CircuitState::HalfOpen {
                warn!(
                    breaker = %self.name,
                    failures = state.failures.len(),
                    timeout = ?self.half_open_timeout,
                    "Half-open probe failed, reopening circuit"
                );
            } else {
                info!(
                    breaker = %self.name,
                    failures = state.failures.len(),
                    threshold = self.failure_threshold,
                    "Circuit breaker opening"
                );
            }
        } else {
            debug!(
                breaker = %self.name,
                failures = state.failures.len(),
                threshold = self.failure_threshold,
                "Request failed in closed state"
            );
        }

        next
    }
}

impl<F, E> std::fmt::Debug for CircuitBreaker<F, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("half_open_timeout", &self.half_open_timeout)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}
