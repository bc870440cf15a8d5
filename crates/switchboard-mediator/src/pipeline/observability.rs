use std::time::Instant;

use tracing::{info_span, Instrument};

use super::{Step, StepFuture};
use crate::pipeline::Decorator;

/// Outermost decorator: opens a tracing span for the whole invocation and
/// logs the final outcome with its duration. The first stage in the
/// pipeline's assembly order.
#[derive(Debug, Default)]
pub struct ObservabilityDecorator;

impl Decorator for ObservabilityDecorator {
    fn wrap(&self, next: Step) -> Step {
        std::sync::Arc::new(move |message, ctx, cancel| -> StepFuture {
            let next = std::sync::Arc::clone(&next);
            let message_id = message.message_id();
            let span = info_span!("process_message", message_id = %message_id, attempt = ctx.attempt);
            Box::pin(
                async move {
                    let start = Instant::now();
                    let (ctx, result) = next(message, ctx, cancel).await;
                    let elapsed = start.elapsed();
                    match &result {
                        switchboard_shared::ProcessingResult::Success(_) => {
                            tracing::info!(duration_ms = elapsed.as_millis(), "message processed");
                        }
                        switchboard_shared::ProcessingResult::IdempotentFailure(error) => {
                            tracing::warn!(duration_ms = elapsed.as_millis(), %error, "message rejected, not retryable");
                        }
                        switchboard_shared::ProcessingResult::TransientFailure(error) => {
                            tracing::warn!(duration_ms = elapsed.as_millis(), %error, "message failed transiently");
                        }
                    }
                    (ctx, result)
                }
                .instrument(span),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use serde_json::Value as JsonValue;
    use std::sync::Arc;
    use switchboard_shared::{Message, MessageEnvelope, ProcessingContext, ProcessingResult, SystemTimeSource, TimeSource};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    #[tokio::test]
    async fn passes_through_success_unchanged() {
        let pipeline = Pipeline::new(vec![Arc::new(ObservabilityDecorator)]);
        let terminal: Step = Arc::new(|_msg, ctx, _cancel| {
            Box::pin(async move { (ctx, ProcessingResult::Success(JsonValue::from(1))) })
        });

        let message: Arc<dyn Message> = Arc::new(MessageEnvelope::new(Uuid::now_v7(), SystemTimeSource.now()));
        let ctx = ProcessingContext::new(Uuid::now_v7(), SystemTimeSource.now());
        let (_ctx, result) = pipeline.run(terminal, message, ctx, CancellationToken::new()).await;
        assert!(matches!(result, ProcessingResult::Success(v) if v == JsonValue::from(1)));
    }
}
