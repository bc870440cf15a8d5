use std::sync::Arc;

use serde_json::Value as JsonValue;
use switchboard_shared::storage::InboxStorage;
use switchboard_shared::ProcessingResult;

use super::{Step, StepFuture};
use crate::pipeline::Decorator;

/// Pipeline stage 5: deduplicates at-least-once transport deliveries by
/// message identity, independent of the business-key idempotency cache
/// stage 4 already ran. A message recorded here is never reprocessed even
/// if its idempotency cache entry has since expired.
///
/// Only a successful inner invocation marks the message seen: a transient
/// failure leaves the inbox untouched so redelivery still reaches the
/// handler.
pub struct InboxDecorator {
    inbox: Arc<dyn InboxStorage>,
}

impl InboxDecorator {
    pub fn new(inbox: Arc<dyn InboxStorage>) -> Self {
        Self { inbox }
    }
}

impl Decorator for InboxDecorator {
    fn wrap(&self, next: Step) -> Step {
        let inbox = Arc::clone(&self.inbox);

        Arc::new(move |message, ctx, cancel| -> StepFuture {
            let next = Arc::clone(&next);
            let inbox = Arc::clone(&inbox);

            Box::pin(async move {
                let message_id = ctx.message_id;

                if matches!(inbox.exists(message_id).await, Ok(true)) {
                    return (ctx, ProcessingResult::Success(JsonValue::Null));
                }

                let (ctx, result) = next(message, ctx, cancel).await;

                if result.is_success() {
                    let _ = inbox.add(message_id).await;
                }

                (ctx, result)
            })
        })
    }
}
