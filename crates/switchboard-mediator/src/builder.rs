use std::sync::Arc;

use bon::Builder;

use switchboard_shared::config::RetryPolicyConfig;
use switchboard_shared::resilience::CircuitBreakerBehavior;
use switchboard_shared::storage::{
    IdempotencyStore, InMemoryIdempotencyStore, InMemoryInboxStorage, InMemoryOutboxStorage,
    InboxStorage, OutboxStorage,
};
use switchboard_shared::{SystemTimeSource, TimeSource};

use crate::idempotency::IdempotencyPolicy;
use crate::pipeline::{
    Decorator, ErrorHandlingDecorator, IdempotencyDecorator, InboxDecorator, ObservabilityDecorator,
    OutboxDecorator, Pipeline, RetryDecorator, ValidationDecorator,
};
use crate::processors::{CommandProcessor, EventBus, QueryProcessor};

/// Assembles the fixed seven-decorator pipeline (observability,
/// error-handling, validation, idempotency, inbox, retry, outbox) and the
/// three processor front ends around a set of pluggable storage backends.
///
/// Every field has an in-memory default, so `MediatorConfig::builder().build()`
/// is usable out of the box; production callers override the storage
/// fields with persistent implementations before calling
/// [`MediatorConfig::assemble`].
#[derive(Builder)]
pub struct MediatorConfig {
    #[builder(default)]
    pub idempotency_policy: IdempotencyPolicy,

    #[builder(default = InMemoryIdempotencyStore::new())]
    pub idempotency_store: Arc<dyn IdempotencyStore>,

    #[builder(default = InMemoryInboxStorage::new())]
    pub inbox: Arc<dyn InboxStorage>,

    #[builder(default)]
    pub outbox: Option<Arc<dyn OutboxStorage>>,

    #[builder(default)]
    pub retry_policy: RetryPolicyConfig,

    #[builder(default)]
    pub circuit_breaker: Option<Arc<dyn CircuitBreakerBehavior>>,

    #[builder(default = Arc::new(SystemTimeSource))]
    pub time_source: Arc<dyn TimeSource>,
}

/// The three typed entry points a caller interacts with once the pipeline
/// is assembled; they share one [`Pipeline`] instance and therefore one
/// set of decorator state (circuit breaker, idempotency store, and so on).
pub struct Mediator {
    pub commands: CommandProcessor,
    pub queries: QueryProcessor,
    pub events: EventBus,
}

impl MediatorConfig {
    /// Builds the decorator chain in its fixed stage order and wires a
    /// fresh [`CommandProcessor`], [`QueryProcessor`], and [`EventBus`]
    /// around the shared pipeline.
    pub fn assemble(self) -> Mediator {
        let outbox = self
            .outbox
            .unwrap_or_else(|| InMemoryOutboxStorage::new(Arc::clone(&self.time_source)) as Arc<dyn OutboxStorage>);

        let decorators: Vec<Arc<dyn Decorator>> = vec![
            Arc::new(ObservabilityDecorator),
            Arc::new(ErrorHandlingDecorator::new(self.circuit_breaker.clone())),
            Arc::new(ValidationDecorator),
            Arc::new(IdempotencyDecorator::new(
                Arc::clone(&self.idempotency_store),
                self.idempotency_policy.clone(),
            )),
            Arc::new(InboxDecorator::new(Arc::clone(&self.inbox))),
            Arc::new(RetryDecorator::new(self.retry_policy.clone())),
            Arc::new(OutboxDecorator::new(outbox, Arc::clone(&self.time_source))),
        ];

        let pipeline = Arc::new(Pipeline::new(decorators));
        Mediator {
            commands: CommandProcessor::new(Arc::clone(&pipeline)),
            queries: QueryProcessor::new(Arc::clone(&pipeline)),
            events: EventBus::new(pipeline),
        }
    }
}
