//! The decorator pipeline: a linear chain of cross-cutting wrappers around
//! handler invocation, assembled once at startup into a closed-over
//! composition — a decorator chain built by a dependency-injection factory
//! into a plain linked list of functions constructed once at startup.
//!
//! Every [`Step`] is generic over the concrete message type: it receives
//! the message behind `Arc<dyn Message>` (for decorators that only need
//! identity/validation/metadata) alongside the per-invocation
//! [`ProcessingContext`] and a [`CancellationToken`]. The terminal step
//! that actually invokes the typed handler is supplied fresh by the
//! processor on every call — it closes over the concrete command/query and
//! handler, so it need not downcast the type-erased message at all.

mod error_handling;
mod idempotency_decorator;
mod inbox;
mod observability;
mod outbox;
mod retry;
mod validation;

pub use error_handling::ErrorHandlingDecorator;
pub use idempotency_decorator::IdempotencyDecorator;
pub use inbox::InboxDecorator;
pub use observability::ObservabilityDecorator;
pub use outbox::OutboxDecorator;
pub use retry::RetryDecorator;
pub use validation::ValidationDecorator;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use switchboard_shared::{Message, ProcessingContext, ProcessingResult};

pub type StepFuture = Pin<Box<dyn Future<Output = (ProcessingContext, ProcessingResult)> + Send>>;

/// One stage of the pipeline: given the message, context, and cancellation
/// token, produce the (possibly mutated) context and a result. Callable
/// more than once — the retry decorator re-invokes its inner step.
pub type Step =
    Arc<dyn Fn(Arc<dyn Message>, ProcessingContext, CancellationToken) -> StepFuture + Send + Sync>;

/// A single cross-cutting concern. `wrap` closes over `next` and returns a
/// new `Step` that runs this decorator's behaviour around it.
pub trait Decorator: Send + Sync {
    fn wrap(&self, next: Step) -> Step;
}

/// The fixed-order stack of decorators (observability, error-handling,
/// validation, idempotency, inbox, retry, outbox). Handler invocation is
/// not part of this list: it is supplied
/// as the terminal `Step` by the processor on every call, since it alone
/// knows the concrete handler and message type.
pub struct Pipeline {
    decorators: Vec<Arc<dyn Decorator>>,
}

impl Pipeline {
    pub fn new(decorators: Vec<Arc<dyn Decorator>>) -> Self {
        Self { decorators }
    }

    /// Folds the fixed decorator stack around `terminal` and invokes the
    /// composed chain once. The fold happens per call because `terminal`
    /// varies per call; the decorator list itself is built once at startup
    /// and never mutated thereafter.
    pub async fn run(
        &self,
        terminal: Step,
        message: Arc<dyn Message>,
        ctx: ProcessingContext,
        cancel: CancellationToken,
    ) -> (ProcessingContext, ProcessingResult) {
        let composed = self
            .decorators
            .iter()
            .rev()
            .fold(terminal, |inner, decorator| decorator.wrap(inner));
        composed(message, ctx, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;
    use switchboard_shared::{SystemTimeSource, TimeSource};
    use uuid::Uuid;

    fn ctx() -> ProcessingContext {
        ProcessingContext::new(Uuid::now_v7(), SystemTimeSource.now())
    }

    struct NoopMessage(switchboard_shared::MessageEnvelope);

    impl std::fmt::Debug for NoopMessage {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_tuple("NoopMessage").finish()
        }
    }

    impl switchboard_shared::Message for NoopMessage {
        fn message_id(&self) -> switchboard_shared::MessageId {
            self.0.message_id()
        }
        fn timestamp(&self) -> switchboard_shared::Timestamp {
            self.0.timestamp()
        }
        fn correlation_id(&self) -> Option<&str> {
            self.0.correlation_id()
        }
        fn causation_id(&self) -> Option<switchboard_shared::MessageId> {
            self.0.causation_id()
        }
        fn metadata(&self) -> Option<&switchboard_shared::Metadata> {
            self.0.metadata()
        }
    }

    fn message() -> Arc<dyn Message> {
        Arc::new(NoopMessage(switchboard_shared::MessageEnvelope::new(
            Uuid::now_v7(),
            SystemTimeSource.now(),
        )))
    }

    #[tokio::test]
    async fn empty_pipeline_invokes_terminal_directly() {
        let pipeline = Pipeline::new(vec![]);
        let terminal: Step = Arc::new(|_msg, ctx, _cancel| {
            Box::pin(async move { (ctx, ProcessingResult::Success(JsonValue::from(7))) })
        });

        let (_ctx, result) = pipeline.run(terminal, message(), ctx(), CancellationToken::new()).await;
        assert!(matches!(result, ProcessingResult::Success(v) if v == JsonValue::from(7)));
    }
}
