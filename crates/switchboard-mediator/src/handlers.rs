//! Handler traits implemented by application code and invoked by the
//! processors at the innermost step of the decorator chain.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use switchboard_shared::{Command, Event, Message, ProcessingContext, SwitchboardError};

/// A fire-and-forget command handler: one per concrete command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(
        &self,
        command: C,
        ctx: &mut ProcessingContext,
        cancel: CancellationToken,
    ) -> Result<(), SwitchboardError>;
}

/// A command handler whose invocation produces a typed response.
#[async_trait]
pub trait CommandHandlerWithResponse<C: Command, R: Send>: Send + Sync {
    async fn handle(
        &self,
        command: C,
        ctx: &mut ProcessingContext,
        cancel: CancellationToken,
    ) -> Result<R, SwitchboardError>;
}

/// A query handler; queries always produce a typed response.
#[async_trait]
pub trait QueryHandler<Q: Message, R: Send>: Send + Sync {
    async fn handle(
        &self,
        query: Q,
        ctx: &mut ProcessingContext,
        cancel: CancellationToken,
    ) -> Result<R, SwitchboardError>;
}

/// An event handler; multiple may be registered for the same event type.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync {
    async fn handle(
        &self,
        event: E,
        ctx: &mut ProcessingContext,
        cancel: CancellationToken,
    ) -> Result<(), SwitchboardError>;
}
