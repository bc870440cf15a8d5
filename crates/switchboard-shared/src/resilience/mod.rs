//! Circuit breaker primitives used ambiently by the error-handling
//! decorator to gate retries of a handler that has been failing
//! persistently, independent of the idempotency/retry classification
//! itself.

mod behavior;
mod breaker;
mod metrics;

pub use behavior::CircuitBreakerBehavior;
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use metrics::{CircuitBreakerMetrics, MetricsCollector, TracingMetricsExporter};
