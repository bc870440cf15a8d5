use serde_json::Value as JsonValue;

use crate::errors::SwitchboardError;

/// Outcome of a single pipeline invocation, as seen by the decorator that
/// invoked the next stage.
///
/// Distinct from a plain `Result<JsonValue, SwitchboardError>` so that the
/// idempotency and retry decorators can distinguish "the handler itself
/// rejected the business operation" from "the handler did not run to
/// completion" without downcasting the error.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    /// The handler ran to completion and produced a value (possibly `Null`
    /// for commands/events with no meaningful response).
    Success(JsonValue),
    /// The handler completed but rejected the operation for a reason that
    /// will not change on retry (validation, business-rule violation).
    /// Idempotency caches this outcome; the retry decorator does not retry.
    IdempotentFailure(SwitchboardError),
    /// The handler failed in a way that may succeed on a later attempt
    /// (timeout, transient dependency failure). Idempotency does not cache
    /// this outcome; the retry decorator retries up to its configured bound.
    TransientFailure(SwitchboardError),
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Success(_))
    }

    pub fn is_transient_failure(&self) -> bool {
        matches!(self, ProcessingResult::TransientFailure(_))
    }

    pub fn is_idempotent_failure(&self) -> bool {
        matches!(self, ProcessingResult::IdempotentFailure(_))
    }

    /// Borrow the failure carried by this result, if any.
    pub fn error(&self) -> Option<&SwitchboardError> {
        match self {
            ProcessingResult::Success(_) => None,
            ProcessingResult::IdempotentFailure(e) | ProcessingResult::TransientFailure(e) => {
                Some(e)
            }
        }
    }
}
