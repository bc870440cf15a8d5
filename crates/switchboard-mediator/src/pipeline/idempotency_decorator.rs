use std::sync::Arc;

use switchboard_shared::storage::{FailureDescriptor, IdempotencyResponse, IdempotencyStatus, IdempotencyStore};
use switchboard_shared::{ProcessingResult, SwitchboardError};

use super::{Step, StepFuture};
use crate::idempotency::IdempotencyPolicy;
use crate::pipeline::Decorator;

/// Pipeline stage 4: deduplicates at-least-once deliveries by a business
/// key, replaying a cached success or failure on a hit and otherwise
/// invoking the inner step and recording its outcome per the policy.
///
/// A store write failure is treated as a permanent cache miss for that
/// attempt: the handler's real result is still returned to the caller,
/// the cache stays empty, and the next duplicate re-executes.
pub struct IdempotencyDecorator {
    store: Arc<dyn IdempotencyStore>,
    policy: IdempotencyPolicy,
}

impl IdempotencyDecorator {
    pub fn new(store: Arc<dyn IdempotencyStore>, policy: IdempotencyPolicy) -> Self {
        Self { store, policy }
    }
}

/// Reconstructs a synthetic error from a cached failure descriptor. Lossy
/// by design: callers must not rely on identity or internal fields
/// surviving a replay, only the type name and message.
fn reconstruct_failure(descriptor: &FailureDescriptor) -> SwitchboardError {
    match descriptor.type_name.as_str() {
        "ValidationFailure" => SwitchboardError::ValidationFailure { reason: descriptor.message.clone() },
        "IdempotentBusinessFailure" => {
            SwitchboardError::IdempotentBusinessFailure { reason: descriptor.message.clone() }
        }
        "InvalidConfiguration" => SwitchboardError::InvalidConfiguration { reason: descriptor.message.clone() },
        _ => SwitchboardError::IdempotentBusinessFailure {
            reason: format!("{}: {}", descriptor.type_name, descriptor.message),
        },
    }
}

fn failure_descriptor(error: &SwitchboardError) -> FailureDescriptor {
    let type_name = match error {
        SwitchboardError::ValidationFailure { .. } => "ValidationFailure",
        SwitchboardError::HandlerNotRegistered { .. } => "HandlerNotRegistered",
        SwitchboardError::HandlerAlreadyRegistered { .. } => "HandlerAlreadyRegistered",
        SwitchboardError::IdempotentBusinessFailure { .. } => "IdempotentBusinessFailure",
        SwitchboardError::TransientFailure { .. } => "TransientFailure",
        SwitchboardError::PoisonMessage { .. } => "PoisonMessage",
        SwitchboardError::ConcurrentSagaUpdate { .. } => "ConcurrentSagaUpdate",
        SwitchboardError::QueueClosed => "QueueClosed",
        SwitchboardError::TransportDisconnected => "TransportDisconnected",
        SwitchboardError::InvalidConfiguration { .. } => "InvalidConfiguration",
        SwitchboardError::Cancelled => "Cancelled",
        SwitchboardError::AggregateFailure { .. } => "AggregateFailure",
    };
    FailureDescriptor {
        type_name: type_name.to_string(),
        message: error.to_string(),
    }
}

impl Decorator for IdempotencyDecorator {
    fn wrap(&self, next: Step) -> Step {
        let store = Arc::clone(&self.store);
        let policy = self.policy.clone();

        Arc::new(move |message, ctx, cancel| -> StepFuture {
            let next = Arc::clone(&next);
            let store = Arc::clone(&store);
            let policy = policy.clone();

            Box::pin(async move {
                let key = policy.key_generator.generate(message.as_ref(), &ctx);

                if let Ok(Some(cached)) = store.get(&key).await {
                    return (ctx, replay(cached));
                }

                let (ctx, result) = next(message, ctx, cancel).await;

                match &result {
                    ProcessingResult::Success(value) => {
                        let _ = store.store_success(&key, Some(value.clone()), policy.success_ttl).await;
                    }
                    ProcessingResult::IdempotentFailure(error)
                        if policy.cache_failures && policy.is_idempotent_failure(error) =>
                    {
                        let _ = store.store_failure(&key, failure_descriptor(error), policy.failure_ttl).await;
                    }
                    _ => {}
                }

                (ctx, result)
            })
        })
    }
}

fn replay(cached: IdempotencyResponse) -> ProcessingResult {
    match cached.status {
        IdempotencyStatus::Success => ProcessingResult::Success(cached.result.unwrap_or(serde_json::Value::Null)),
        IdempotencyStatus::Failure => {
            let descriptor = cached.failure.unwrap_or(FailureDescriptor {
                type_name: "Unknown".into(),
                message: "no failure detail recorded".into(),
            });
            ProcessingResult::IdempotentFailure(reconstruct_failure(&descriptor))
        }
    }
}
