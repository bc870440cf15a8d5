use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use switchboard_shared::{Command, Message, ProcessingContext, SwitchboardError};

use super::{classify, success};
use crate::handlers::{CommandHandler, CommandHandlerWithResponse};
use crate::pipeline::{Pipeline, Step, StepFuture};
use crate::registry::SingleHandlerRegistry;

/// Dispatches commands to exactly one registered handler each, running the
/// full decorator pipeline around every invocation. Fire-and-forget
/// commands and response-bearing commands are tracked in separate
/// registries so the same command type cannot accidentally be registered
/// under both dispatch styles.
pub struct CommandProcessor {
    pipeline: Arc<Pipeline>,
    fire_and_forget: SingleHandlerRegistry,
    with_response: SingleHandlerRegistry,
}

impl CommandProcessor {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            fire_and_forget: SingleHandlerRegistry::new(),
            with_response: SingleHandlerRegistry::new(),
        }
    }

    pub fn register<C>(&self, handler: Arc<dyn CommandHandler<C>>) -> Result<(), SwitchboardError>
    where
        C: Command + 'static,
    {
        self.fire_and_forget
            .register::<C, Arc<dyn CommandHandler<C>>>(std::any::type_name::<C>(), handler)
    }

    pub fn register_with_response<C, R>(
        &self,
        handler: Arc<dyn CommandHandlerWithResponse<C, R>>,
    ) -> Result<(), SwitchboardError>
    where
        C: Command + 'static,
        R: Send + 'static,
    {
        self.with_response
            .register::<C, Arc<dyn CommandHandlerWithResponse<C, R>>>(std::any::type_name::<C>(), handler)
    }

    /// Sends a fire-and-forget command through the pipeline. The handler's
    /// `Ok(())` becomes `ProcessingResult::Success(Null)`.
    pub async fn send<C>(&self, command: C, cancel: CancellationToken) -> Result<(), SwitchboardError>
    where
        C: Command + Clone + Send + Sync + 'static,
    {
        let handler = self
            .fire_and_forget
            .get::<C, Arc<dyn CommandHandler<C>>>(std::any::type_name::<C>())?;

        let message_id = command.message_id();
        let received_at = command.timestamp();
        let message: Arc<dyn Message> = Arc::new(command.clone());
        let ctx = ProcessingContext::new(message_id, received_at);

        let terminal: Step = Arc::new(move |_message, ctx, cancel| -> StepFuture {
            let handler = Arc::clone(&handler);
            let command = command.clone();
            Box::pin(async move {
                let mut ctx = ctx;
                match handler.handle(command, &mut ctx, cancel).await {
                    Ok(()) => success(ctx, JsonValue::Null),
                    Err(error) => classify(ctx, error),
                }
            })
        });

        let (_ctx, result) = self.pipeline.run(terminal, message, ctx, cancel).await;
        match result.error() {
            None => Ok(()),
            Some(error) => Err(error.clone()),
        }
    }

    /// Sends a command through the pipeline and returns its typed response.
    pub async fn send_with_response<C, R>(&self, command: C, cancel: CancellationToken) -> Result<R, SwitchboardError>
    where
        C: Command + Clone + Send + Sync + 'static,
        R: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        let handler = self
            .with_response
            .get::<C, Arc<dyn CommandHandlerWithResponse<C, R>>>(std::any::type_name::<C>())?;

        let message_id = command.message_id();
        let received_at = command.timestamp();
        let message: Arc<dyn Message> = Arc::new(command.clone());
        let ctx = ProcessingContext::new(message_id, received_at);

        let terminal: Step = Arc::new(move |_message, ctx, cancel| -> StepFuture {
            let handler = Arc::clone(&handler);
            let command = command.clone();
            Box::pin(async move {
                let mut ctx = ctx;
                match handler.handle(command, &mut ctx, cancel).await {
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
            switchboard_shared::ProcessingResult::Success(value) => {
                serde_json::from_value(value).map_err(|error| SwitchboardError::ValidationFailure {
                    reason: format!("response deserialization failed: {error}"),
                })
            }
            switchboard_shared::ProcessingResult::IdempotentFailure(error)
            | switchboard_shared::ProcessingResult::TransientFailure(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use switchboard_shared::{MessageEnvelope, MessageId, Metadata, TimeSource, Timestamp};
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    struct CreateOrder {
        envelope: MessageEnvelope,
        order_id: u32,
    }

    impl Message for CreateOrder {
        fn message_id(&self) -> MessageId {
            self.envelope.message_id()
        }
        fn timestamp(&self) -> Timestamp {
            self.envelope.timestamp()
        }
        fn correlation_id(&self) -> Option<&str> {
            self.envelope.correlation_id()
        }
        fn causation_id(&self) -> Option<MessageId> {
            self.envelope.causation_id()
        }
        fn metadata(&self) -> Option<&Metadata> {
            self.envelope.metadata()
        }
    }
    impl Command for CreateOrder {}

    struct CreateOrderHandler;

    #[async_trait]
    impl CommandHandler<CreateOrder> for CreateOrderHandler {
        async fn handle(
            &self,
            _command: CreateOrder,
            _ctx: &mut ProcessingContext,
            _cancel: CancellationToken,
        ) -> Result<(), SwitchboardError> {
            Ok(())
        }
    }

    struct CreateOrderWithResponseHandler;

    #[async_trait]
    impl CommandHandlerWithResponse<CreateOrder, u32> for CreateOrderWithResponseHandler {
        async fn handle(
            &self,
            command: CreateOrder,
            _ctx: &mut ProcessingContext,
            _cancel: CancellationToken,
        ) -> Result<u32, SwitchboardError> {
            Ok(command.order_id)
        }
    }

    fn order() -> CreateOrder {
        CreateOrder {
            envelope: MessageEnvelope::new(Uuid::now_v7(), switchboard_shared::SystemTimeSource.now()),
            order_id: 7,
        }
    }

    #[tokio::test]
    async fn send_invokes_registered_handler() {
        let processor = CommandProcessor::new(Arc::new(Pipeline::new(vec![])));
        processor.register(Arc::new(CreateOrderHandler)).unwrap();

        let result = processor.send(order(), CancellationToken::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn send_without_registration_fails() {
        let processor = CommandProcessor::new(Arc::new(Pipeline::new(vec![])));
        let err = processor.send(order(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::HandlerNotRegistered { .. }));
    }

    #[tokio::test]
    async fn second_registration_of_same_type_is_rejected() {
        let processor = CommandProcessor::new(Arc::new(Pipeline::new(vec![])));
        processor.register(Arc::new(CreateOrderHandler)).unwrap();
        let err = processor.register(Arc::new(CreateOrderHandler)).unwrap_err();
        assert!(matches!(err, SwitchboardError::HandlerAlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn send_with_response_returns_typed_value() {
        let processor = CommandProcessor::new(Arc::new(Pipeline::new(vec![])));
        processor
            .register_with_response(Arc::new(CreateOrderWithResponseHandler))
            .unwrap();

        let response: u32 = processor.send_with_response(order(), CancellationToken::new()).await.unwrap();
        assert_eq!(response, 7);
    }
}
