use std::sync::Arc;

use switchboard_shared::ProcessingResult;

use super::{Step, StepFuture};
use crate::pipeline::Decorator;

/// Pipeline stage 3: rejects malformed input before any side effect by
/// calling the message's own [`switchboard_shared::Message::validate`].
/// Concrete message types override the default no-op to provide
/// hand-written validation in place of the source-generator validators
/// this would come from in the original system.
#[derive(Debug, Default)]
pub struct ValidationDecorator;

impl Decorator for ValidationDecorator {
    fn wrap(&self, next: Step) -> Step {
        Arc::new(move |message, ctx, cancel| -> StepFuture {
            let next = Arc::clone(&next);
            Box::pin(async move {
                if let Err(error) = message.validate() {
                    return (ctx, ProcessingResult::IdempotentFailure(error));
                }
                next(message, ctx, cancel).await
            })
        })
    }
}
