//! Typed entry points that sit in front of the decorator [`Pipeline`](crate::pipeline::Pipeline):
//! [`CommandProcessor`] for fire-and-forget and response-bearing commands,
//! [`QueryProcessor`] for read operations, and [`EventBus`] for fan-out
//! notifications to zero or more subscribers.

mod command;
mod event;
mod query;

pub use command::CommandProcessor;
pub use event::EventBus;
pub use query::QueryProcessor;

use serde_json::Value as JsonValue;
use switchboard_shared::{ProcessingContext, ProcessingResult, SwitchboardError};

/// Maps a raw handler error onto the [`ProcessingResult`] variant the
/// pipeline's idempotency and retry decorators expect, using
/// [`SwitchboardError::is_recoverable`] to decide whether the failure is
/// worth retrying.
pub(crate) fn classify(ctx: ProcessingContext, error: SwitchboardError) -> (ProcessingContext, ProcessingResult) {
    if error.is_recoverable() {
        (ctx, ProcessingResult::TransientFailure(error))
    } else {
        (ctx, ProcessingResult::IdempotentFailure(error))
    }
}

pub(crate) fn success(ctx: ProcessingContext, value: JsonValue) -> (ProcessingContext, ProcessingResult) {
    (ctx, ProcessingResult::Success(value))
}
