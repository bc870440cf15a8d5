use std::sync::Arc;
use std::time::Instant;

use switchboard_shared::resilience::CircuitBreakerBehavior;
use switchboard_shared::{ProcessingResult, SwitchboardError};

use super::{Step, StepFuture};
use crate::pipeline::Decorator;

/// Pipeline stage 2: a safety net around everything below it. Catches a
/// handler panic (by running the inner step on its own task and inspecting
/// the `JoinError`) and turns it into a `TransientFailure` rather than
/// letting it unwind across the mediator boundary, and optionally feeds a
/// circuit breaker so repeated failures of one operation can be gated
/// independently of the retry/idempotency classification itself.
pub struct ErrorHandlingDecorator {
    circuit_breaker: Option<Arc<dyn CircuitBreakerBehavior>>,
}

impl ErrorHandlingDecorator {
    pub fn new(circuit_breaker: Option<Arc<dyn CircuitBreakerBehavior>>) -> Self {
        Self { circuit_breaker }
    }
}

impl Decorator for ErrorHandlingDecorator {
    fn wrap(&self, next: Step) -> Step {
        let circuit_breaker = self.circuit_breaker.clone();
        Arc::new(move |message, ctx, cancel| -> StepFuture {
            let next = Arc::clone(&next);
            let circuit_breaker = circuit_breaker.clone();
            Box::pin(async move {
                let start = Instant::now();
                let outcome = tokio::spawn(async move { next(message, ctx, cancel).await }).await;
                let elapsed = start.elapsed();

                let (ctx, result) = match outcome {
                    Ok(pair) => pair,
                    Err(join_error) => {
                        // The original context moved into the spawned task and is
                        // unrecoverable once it panics; a fresh context is handed
                        // back so the chain above can still complete.
                        let reason = if join_error.is_panic() {
                            "handler panicked".to_string()
                        } else {
                            "handler task was cancelled".to_string()
                        };
                        (
                            switchboard_shared::ProcessingContext::new(
                                uuid::Uuid::now_v7(),
                                switchboard_shared::SystemTimeSource.now(),
                            ),
                            ProcessingResult::TransientFailure(SwitchboardError::TransientFailure { reason }),
                        )
                    }
                };

                if let Some(breaker) = &circuit_breaker {
                    match &result {
                        ProcessingResult::Success(_) => breaker.record_success(elapsed),
                        ProcessingResult::IdempotentFailure(_) | ProcessingResult::TransientFailure(_) => {
                            breaker.record_failure(elapsed)
                        }
                    }
                }

                (ctx, result)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use serde_json::Value as JsonValue;
    use switchboard_shared::resilience::{CircuitBreaker, CircuitBreakerConfig};
    use switchboard_shared::{Message, MessageEnvelope, ProcessingContext, SystemTimeSource, TimeSource};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn message() -> Arc<dyn Message> {
        Arc::new(MessageEnvelope::new(Uuid::now_v7(), SystemTimeSource.now()))
    }

    #[tokio::test]
    async fn panic_in_inner_step_becomes_transient_failure() {
        let pipeline = Pipeline::new(vec![Arc::new(ErrorHandlingDecorator::new(None))]);
        let terminal: Step = Arc::new(|_msg, _ctx, _cancel| Box::pin(async move { panic!("boom") }));

        let ctx = ProcessingContext::new(Uuid::now_v7(), SystemTimeSource.now());
        let (_ctx, result) = pipeline.run(terminal, message(), ctx, CancellationToken::new()).await;
        assert!(result.is_transient_failure());
    }

    #[tokio::test]
    async fn success_feeds_circuit_breaker() {
        let breaker: Arc<dyn CircuitBreakerBehavior> = Arc::new(CircuitBreaker::new(
            "test".into(),
            CircuitBreakerConfig::default(),
        ));
        let pipeline = Pipeline::new(vec![Arc::new(ErrorHandlingDecorator::new(Some(Arc::clone(&breaker))))]);
        let terminal: Step =
            Arc::new(|_msg, ctx, _cancel| Box::pin(async move { (ctx, ProcessingResult::Success(JsonValue::Null)) }));

        let ctx = ProcessingContext::new(Uuid::now_v7(), SystemTimeSource.now());
        pipeline.run(terminal, message(), ctx, CancellationToken::new()).await;

        assert_eq!(breaker.metrics().success_count, 1);
    }
}
