use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::info;

use crate::resilience::behavior::CircuitBreakerBehavior;
use crate::resilience::metrics::CircuitBreakerMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Generic atomics-based circuit breaker guarding repeated invocation of a
/// failing operation.
///
/// Closed → Open on `failure_threshold` consecutive failures. Open → HalfOpen
/// once `timeout` has elapsed since the last failure. HalfOpen → Closed
/// after `success_threshold` consecutive successes, or back to Open on any
/// failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    half_open_successes: AtomicU32,
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_duration_nanos: AtomicU64,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            state: AtomicU8::new(CircuitState::Closed.as_u8()),
            consecutive_failures: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            total_calls: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            total_duration_nanos: AtomicU64::new(0),
            opened_at: Mutex::new(None),
        }
    }

    fn transition(&self, to: CircuitState) {
        let from = CircuitState::from_u8(self.state.swap(to.as_u8(), Ordering::SeqCst));
        if from != to {
            info!(circuit_breaker = %self.name, ?from, ?to, "circuit breaker state transition");
        }
    }

    fn maybe_half_open(&self) {
        if CircuitState::from_u8(self.state.load(Ordering::SeqCst)) != CircuitState::Open {
            return;
        }
        let elapsed = self
            .opened_at
            .lock()
            .expect("circuit breaker mutex poisoned")
            .map(|at| at.elapsed() >= self.config.timeout)
            .unwrap_or(false);
        if elapsed {
            self.half_open_successes.store(0, Ordering::SeqCst);
            self.transition(CircuitState::HalfOpen);
        }
    }

    pub fn record_success_manual(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        self.success_count.fetch_add(1, Ordering::SeqCst);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);

        match CircuitState::from_u8(self.state.load(Ordering::SeqCst)) {
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    self.transition(CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure_manual(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        self.failure_count.fetch_add(1, Ordering::SeqCst);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);

        match CircuitState::from_u8(self.state.load(Ordering::SeqCst)) {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    *self.opened_at.lock().expect("circuit breaker mutex poisoned") = Some(Instant::now());
                    self.transition(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                *self.opened_at.lock().expect("circuit breaker mutex poisoned") = Some(Instant::now());
                self.transition(CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        self.maybe_half_open();
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn should_allow(&self) -> bool {
        self.maybe_half_open();
        !matches!(self.state(), CircuitState::Open)
    }

    fn record_success(&self, duration: Duration) {
        self.record_success_manual(duration);
    }

    fn record_failure(&self, duration: Duration) {
        self.record_failure_manual(duration);
    }

    fn is_healthy(&self) -> bool {
        self.metrics().is_healthy()
    }

    fn force_open(&self) {
        *self.opened_at.lock().expect("circuit breaker mutex poisoned") = Some(Instant::now());
        self.transition(CircuitState::Open);
    }

    fn force_closed(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.transition(CircuitState::Closed);
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        let total_calls = self.total_calls.load(Ordering::SeqCst);
        let success_count = self.success_count.load(Ordering::SeqCst);
        let failure_count = self.failure_count.load(Ordering::SeqCst);
        let total_duration = Duration::from_nanos(self.total_duration_nanos.load(Ordering::SeqCst));

        let (failure_rate, success_rate) = if total_calls > 0 {
            (
                failure_count as f64 / total_calls as f64,
                success_count as f64 / total_calls as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let average_duration = if total_calls > 0 {
            total_duration / total_calls as u32
        } else {
            Duration::ZERO
        };

        CircuitBreakerMetrics {
            total_calls,
            success_count,
            failure_count,
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst) as u64,
            half_open_calls: self.half_open_successes.load(Ordering::SeqCst) as u64,
            total_duration,
            current_state: CircuitState::from_u8(self.state.load(Ordering::SeqCst)),
            failure_rate,
            success_rate,
            average_duration,
        }
    }
}
