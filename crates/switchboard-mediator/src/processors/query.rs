use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use switchboard_shared::{Message, Query, ProcessingContext, ProcessingResult, SwitchboardError};

use super::{classify, success};
use crate::handlers::QueryHandler;
use crate::pipeline::{Pipeline, Step, StepFuture};
use crate::registry::SingleHandlerRegistry;

/// Dispatches queries to exactly one registered handler each, always
/// returning a typed response. Queries run through the same decorator
/// pipeline as commands (observability, validation, retry), though
/// idempotency caching a read is rarely useful and the outbox stage is a
/// no-op absent a staged annotation.
pub struct QueryProcessor {
    pipeline: Arc<Pipeline>,
    registry: SingleHandlerRegistry,
}

impl QueryProcessor {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            registry: SingleHandlerRegistry::new(),
        }
    }

    pub fn register<Q, R>(&self, handler: Arc<dyn QueryHandler<Q, R>>) -> Result<(), SwitchboardError>
    where
        Q: Query<R> + 'static,
        R: Send + 'static,
    {
        self.registry
            .register::<Q, Arc<dyn QueryHandler<Q, R>>>(std::any::type_name::<Q>(), handler)
    }

    pub async fn ask<Q, R>(&self, query: Q, cancel: CancellationToken) -> Result<R, SwitchboardError>
    where
        Q: Query<R> + Clone + Send + Sync + 'static,
        R: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        let handler = self
            .registry
            .get::<Q, Arc<dyn QueryHandler<Q, R>>>(std::any::type_name::<Q>())?;

        let message_id = query.message_id();
        let received_at = query.timestamp();
        let message: Arc<dyn Message> = Arc::new(query.clone());
        let ctx = ProcessingContext::new(message_id, received_at);

        let terminal: Step = Arc::new(move |_message, ctx, cancel| -> StepFuture {
            let handler = Arc::clone(&handler);
            let query = query.clone();
            Box::pin(async move {
                let mut ctx = ctx;
                match handler.handle(query, &mut ctx, cancel).await {
                    Ok(response) => match serde_json::to_value(response) {
                        Ok(value) => success(ctx, value),
                        Err(error) => classify(
                            ctx,
                            SwitchboardError::ValidationFailure {
                                reason: format!("response serialization failed: {error}"),
                            },
                        ),
                    },
                    Err(error) => classify(ctx, error),
                }
            })
        });

        let (_ctx, result) = self.pipeline.run(terminal, message, ctx, cancel).await;
        match result {
            ProcessingResult::Success(value) => {
                serde_json::from_value(value).map_err(|error| SwitchboardError::ValidationFailure {
                    reason: format!("response deserialization failed: {error}"),
                })
            }
            ProcessingResult::IdempotentFailure(error) | ProcessingResult::TransientFailure(error) => Err(error),
        }
    }
}
