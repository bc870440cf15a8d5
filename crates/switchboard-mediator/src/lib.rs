//! # switchboard-mediator
//!
//! The decorator pipeline, the idempotency subsystem, and the typed
//! command/query/event processor front ends that sit on top of it.
//!
//! [`MediatorConfig`] assembles the fixed seven-stage pipeline:
//! observability, error-handling, validation, idempotency, inbox, retry,
//! outbox. Handler invocation itself is supplied per call by whichever
//! processor owns the concrete handler type, since the pipeline never
//! needs to downcast the type-erased message it carries.

mod builder;
pub mod handlers;
pub mod idempotency;
pub mod pipeline;
pub mod processors;
pub mod registry;

pub use builder::{Mediator, MediatorConfig};
pub use handlers::{CommandHandler, CommandHandlerWithResponse, EventHandler, QueryHandler};
pub use processors::{CommandProcessor, EventBus, QueryProcessor};
