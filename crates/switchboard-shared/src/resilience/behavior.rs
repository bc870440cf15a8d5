use std::time::Duration;

use crate::resilience::{CircuitBreakerMetrics, CircuitState};

/// Unified interface over any circuit breaker implementation.
///
/// Object-safe so callers can hold `&dyn CircuitBreakerBehavior` when they
/// need uniform access (health reporting, metrics collection) without
/// committing to a concrete breaker type.
pub trait CircuitBreakerBehavior: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn state(&self) -> CircuitState;

    /// Whether the circuit currently allows an attempt.
    fn should_allow(&self) -> bool;

    fn record_success(&self, duration: Duration);

    fn record_failure(&self, duration: Duration);

    fn is_healthy(&self) -> bool;

    fn force_open(&self);

    fn force_closed(&self);

    fn metrics(&self) -> CircuitBreakerMetrics;
}
