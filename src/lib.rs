pub mod circuit_breaker;
pub mod config;
pub mod error;

pub use crate::circuit_breaker::{BreakerMetrics, CircuitBreaker, CircuitState};
pub use crate::config::BreakerConfig;
pub use crate::error::{BreakerError, ConfigError, Failure};

/// Initialize tracing/logging.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "breaker=debug".into()),
        )
        .with_target(false)
        .compact()
        .try_init();
}
