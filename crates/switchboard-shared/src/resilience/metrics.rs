use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::breaker::CircuitState;

/// Point-in-time snapshot of a circuit breaker's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u64,
    pub half_open_calls: u64,
    pub total_duration: Duration,
    pub current_state: CircuitState,
    pub failure_rate: f64,
    pub success_rate: f64,
    pub average_duration: Duration,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            half_open_calls: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
            failure_rate: 0.0,
            success_rate: 0.0,
            average_duration: Duration::ZERO,
        }
    }

    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Testing system health",
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Success: {:.1}% | Failures: {} | Avg Duration: {:.2}ms",
            self.state_description(),
            self.total_calls,
            self.success_rate * 100.0,
            self.failure_count,
            self.average_duration.as_millis()
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Hook for exporting circuit breaker metrics to a monitoring system.
pub trait MetricsCollector: Send + Sync {
    fn record_circuit_breaker_metrics(&self, name: &str, metrics: &CircuitBreakerMetrics);

    fn record_state_transition(&self, name: &str, from: CircuitState, to: CircuitState);

    fn record_operation_timing(&self, name: &str, duration: Duration, success: bool);
}

/// Exports metrics via `tracing` events; a real deployment would wire a
/// dedicated exporter (Prometheus, OTLP) behind this same trait.
#[derive(Debug, Default)]
pub struct TracingMetricsExporter;

impl MetricsCollector for TracingMetricsExporter {
    fn record_circuit_breaker_metrics(&self, name: &str, metrics: &CircuitBreakerMetrics) {
        tracing::info!(
            circuit_breaker = name,
            total_calls = metrics.total_calls,
            success_count = metrics.success_count,
            failure_count = metrics.failure_count,
            failure_rate = metrics.failure_rate,
            state = ?metrics.current_state,
            "circuit breaker metrics"
        );
    }

    fn record_state_transition(&self, name: &str, from: CircuitState, to: CircuitState) {
        tracing::info!(
            circuit_breaker = name,
            from_state = ?from,
            to_state = ?to,
            "circuit breaker state transition"
        );
    }

    fn record_operation_timing(&self, name: &str, duration: Duration, success: bool) {
        tracing::debug!(
            circuit_breaker = name,
            duration_ms = duration.as_millis(),
            success = success,
            "operation timing"
        );
    }
}
