use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, every request is let through as a probe
    HalfOpen,
}

impl CircuitState {
    /// Derive the state from the failure record and the time since the last failure.
    ///
    /// `since_last_failure` is `None` while no failure clock is running, which counts
    /// as zero elapsed time.
    pub fn evaluate(
        failures: usize,
        failure_threshold: usize,
        since_last_failure: Option<Duration>,
        half_open_timeout: Duration,
    ) -> Self {
        if failures <= failure_threshold {
            return CircuitState::Closed;
        }

        if since_last_failure.unwrap_or(Duration::ZERO) > half_open_timeout {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Whether a call may reach the protected operation
    pub fn permits_call(&self) -> bool {
        !matches!(self, CircuitState::Open)
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakerMetrics {
    /// Total number of attempts, rejected ones included
    pub total_requests: u64,
    /// Number of successful calls
    pub successful_requests: u64,
    /// Number of failed calls, timeouts and cancellations included
    pub failed_requests: u64,
    /// Number of attempts rejected without calling the operation
    pub rejected_requests: u64,
    /// Number of calls that exceeded the call timeout
    pub timeout_count: u64,
    /// Number of calls dropped by the caller while in flight
    pub cancelled_count: u64,
    /// Number of times a failure tipped the circuit open
    pub circuit_opened_count: u64,
    /// Number of times a probe closed the circuit again
    pub circuit_closed_count: u64,
}
