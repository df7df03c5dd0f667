use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for breaker construction and configuration
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading configuration or constructing a breaker
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failure threshold must be a positive number (0 for 'no failures allowed'), got {0}")]
    InvalidThreshold(i64),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// A single recorded failure of the protected operation
#[derive(Error, Debug)]
pub enum Failure<E> {
    /// The operation itself returned an error
    #[error("{0}")]
    Operation(E),

    /// The operation did not finish within the configured call timeout
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The caller dropped the attempt while the operation was in flight
    #[error("Operation cancelled before completion")]
    Cancelled,
}

impl<E> Failure<E> {
    /// The operation's own error, if this failure carries one
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Failure::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Error returned by `CircuitBreaker::attempt`
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// The operation failed but the circuit is still closed
    #[error("Operation failed: {0}")]
    OperationFailed(Arc<Failure<E>>),

    /// The circuit is open; carries every failure since the last success
    #[error("Circuit open: {} failures recorded since last success", .causes.len())]
    CircuitOpen { causes: Vec<Arc<Failure<E>>> },
}

impl<E> BreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakerError::CircuitOpen { .. })
    }

    /// All failures carried by this error, oldest first
    pub fn causes(&self) -> &[Arc<Failure<E>>] {
        match self {
            BreakerError::OperationFailed(cause) => std::slice::from_ref(cause),
            BreakerError::CircuitOpen { causes } => causes,
        }
    }
}
