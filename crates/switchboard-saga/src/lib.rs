//! Correlated saga state machines: a definition of states, transitions,
//! timeouts, and compensations, driven by an orchestrator that persists
//! instances under optimistic concurrency and serializes processing per
//! correlation id.

mod definition;
mod errors;
mod events;
mod orchestrator;
mod repository;
mod saga;

pub use definition::{Compensation, SagaDefinition, SagaDefinitionBuilder, TimeoutSpec, Transition, TransitionAction};
pub use errors::SagaError;
pub use events::SagaEvent;
pub use orchestrator::SagaOrchestrator;
pub use repository::{InMemorySagaRepository, SagaRepository};
pub use saga::Saga;
