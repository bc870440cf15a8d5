use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use switchboard_shared::{Event, Message, ProcessingContext, ProcessingResult, SwitchboardError};

use super::success;
use crate::handlers::EventHandler;
use crate::pipeline::{Pipeline, Step, StepFuture};
use crate::registry::MultiHandlerRegistry;

/// Fans an event out to every handler registered for its concrete type,
/// running all of them concurrently inside a single pipeline invocation.
///
/// An event is considered published as soon as it is handed to every
/// subscriber: a handler that fails does not roll back or prevent
/// delivery to the others. Any failures are collected into a single
/// [`SwitchboardError::AggregateFailure`] and classified as transient
/// (retryable) if at least one failing handler's error was itself
/// recoverable, otherwise as a permanent idempotent failure.
pub struct EventBus {
    pipeline: Arc<Pipeline>,
    registry: MultiHandlerRegistry,
}

impl EventBus {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            registry: MultiHandlerRegistry::new(),
        }
    }

    pub fn subscribe<E>(&self, handler: Arc<dyn EventHandler<E>>)
    where
        E: Event + 'static,
    {
        self.registry.register::<E, Arc<dyn EventHandler<E>>>(handler);
    }

    pub async fn publish<E>(&self, event: E, cancel: CancellationToken) -> Result<(), SwitchboardError>
    where
        E: Event + Clone + Send + Sync + 'static,
    {
        let handlers = self.registry.get_all::<E, Arc<dyn EventHandler<E>>>();

        let message_id = event.message_id();
        let received_at = event.timestamp();
        let message: Arc<dyn Message> = Arc::new(event.clone());
        let ctx = ProcessingContext::new(message_id, received_at);

        let terminal: Step = Arc::new(move |_message, ctx, cancel| -> StepFuture {
            let handlers = handlers.clone();
            let event = event.clone();
            Box::pin(async move {
                if handlers.is_empty() {
                    return success(ctx, JsonValue::Null);
                }

                let invocations = handlers.iter().map(|handler| {
                    let handler = Arc::clone(handler);
                    let event = event.clone();
                    let mut sub_ctx = ctx.clone();
                    let cancel = cancel.clone();
                    async move { handler.handle(event, &mut sub_ctx, cancel).await }
                });

                let results: Vec<Result<(), SwitchboardError>> = futures::future::join_all(invocations).await;
                let failures: Vec<String> = results
                    .iter()
                    .filter_map(|result| result.as_ref().err().map(ToString::to_string))
                    .collect();

                if failures.is_empty() {
                    return success(ctx, JsonValue::Null);
                }

                let any_recoverable = results
                    .iter()
                    .any(|result| result.as_ref().err().is_some_and(SwitchboardError::is_recoverable));
                let aggregate = SwitchboardError::AggregateFailure {
                    handler_count: handlers.len(),
                    failures,
                };

                if any_recoverable {
                    (ctx, ProcessingResult::TransientFailure(aggregate))
                } else {
                    (ctx, ProcessingResult::IdempotentFailure(aggregate))
                }
            })
        });

        let (_ctx, result) = self.pipeline.run(terminal, message, ctx, cancel).await;
        match result.error() {
            None => Ok(()),
            Some(error) => Err(error.clone()),
        }
    }
}
