use std::sync::Arc;

use chrono::Duration;
use switchboard_shared::SwitchboardError;

use super::{DefaultKeyGenerator, IdempotencyKeyGenerator};

/// Classification and TTL knobs for the idempotency decorator.
///
/// `is_idempotent_failure` draws the line between outcomes safe to cache:
/// only permanent, deterministic failures are safe to cache — transient
/// faults must be retried on every attempt and are never written to the
/// store.
pub struct IdempotencyPolicy {
    pub success_ttl: Duration,
    pub failure_ttl: Duration,
    pub cache_failures: bool,
    pub key_generator: Arc<dyn IdempotencyKeyGenerator>,
}

impl std::fmt::Debug for IdempotencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyPolicy")
            .field("success_ttl", &self.success_ttl)
            .field("failure_ttl", &self.failure_ttl)
            .field("cache_failures", &self.cache_failures)
            .finish()
    }
}

impl Clone for IdempotencyPolicy {
    fn clone(&self) -> Self {
        Self {
            success_ttl: self.success_ttl,
            failure_ttl: self.failure_ttl,
            cache_failures: self.cache_failures,
            key_generator: Arc::clone(&self.key_generator),
        }
    }
}

impl Default for IdempotencyPolicy {
    fn default() -> Self {
        Self {
            success_ttl: Duration::hours(24),
            failure_ttl: Duration::hours(1),
            cache_failures: true,
            key_generator: Arc::new(DefaultKeyGenerator),
        }
    }
}

impl IdempotencyPolicy {
    /// Whether a failure is a permanent, deterministic business outcome
    /// safe to cache (as opposed to a transient fault that must be retried
    /// on every duplicate delivery).
    pub fn is_idempotent_failure(&self, error: &SwitchboardError) -> bool {
        match error {
            SwitchboardError::ValidationFailure { .. }
            | SwitchboardError::IdempotentBusinessFailure { .. }
            | SwitchboardError::HandlerNotRegistered { .. }
            | SwitchboardError::InvalidConfiguration { .. } => true,

            SwitchboardError::TransientFailure { .. }
            | SwitchboardError::Cancelled
            | SwitchboardError::QueueClosed
            | SwitchboardError::TransportDisconnected
            | SwitchboardError::PoisonMessage { .. }
            | SwitchboardError::ConcurrentSagaUpdate { .. }
            | SwitchboardError::HandlerAlreadyRegistered { .. }
            | SwitchboardError::AggregateFailure { .. } => false,
        }
    }
}
