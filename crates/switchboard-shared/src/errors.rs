//! Shared error kinds used across the switchboard workspace.
//!
//! One variant per error kind named in the processing-pipeline and
//! transport specifications. Downstream crates keep narrower error enums
//! for failures internal to one layer and convert into this one with
//! `#[from]` at crate boundaries.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SwitchboardError {
    #[error("validation failed: {reason}")]
    ValidationFailure { reason: String },

    #[error("no handler registered for {type_name}")]
    HandlerNotRegistered { type_name: &'static str },

    #[error("a handler is already registered for {type_name}")]
    HandlerAlreadyRegistered { type_name: &'static str },

    #[error("business rule rejected the operation: {reason}")]
    IdempotentBusinessFailure { reason: String },

    #[error("transient failure: {reason}")]
    TransientFailure { reason: String },

    #[error("poison message after {attempts} attempts: {reason}")]
    PoisonMessage { attempts: u32, reason: String },

    #[error(
        "concurrent update to saga {correlation_id}: expected version {expected}, found {actual}"
    )]
    ConcurrentSagaUpdate {
        correlation_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("queue closed")]
    QueueClosed,

    #[error("transport disconnected")]
    TransportDisconnected,

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("operation cancelled")]
    Cancelled,

    /// Surfaced by [`EventBus::publish`] when one or more of several
    /// independent handlers for the same event failed; the event is still
    /// considered published to every handler that succeeded.
    #[error("{} of {} event handlers failed: {}", failures.len(), handler_count, failures.join("; "))]
    AggregateFailure {
        handler_count: usize,
        failures: Vec<String>,
    },
}

impl SwitchboardError {
    /// Whether a retry (or circuit-breaker half-open probe) stands a
    /// realistic chance of a different outcome.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SwitchboardError::TransientFailure { .. } | SwitchboardError::TransportDisconnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failure_is_recoverable() {
        let err = SwitchboardError::TransientFailure {
            reason: "timeout".into(),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn validation_failure_is_not_recoverable() {
        let err = SwitchboardError::ValidationFailure {
            reason: "missing field".into(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn concurrent_saga_update_message_includes_versions() {
        let err = SwitchboardError::ConcurrentSagaUpdate {
            correlation_id: "order-1".into(),
            expected: 3,
            actual: 4,
        };
        let message = err.to_string();
        assert!(message.contains("order-1"));
        assert!(message.contains('3'));
        assert!(message.contains('4'));
    }
}
