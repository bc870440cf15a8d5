use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use switchboard_shared::config::RetryPolicyConfig;
use switchboard_shared::SwitchboardError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Created,
    Starting,
    Active,
    ProcessingMessage,
    Stopping,
    Stopped,
    Disposed,
}

impl ConsumerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConsumerState::Created,
            1 => ConsumerState::Starting,
            2 => ConsumerState::Active,
            3 => ConsumerState::ProcessingMessage,
            4 => ConsumerState::Stopping,
            5 => ConsumerState::Stopped,
            _ => ConsumerState::Disposed,
        }
    }

    fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Default)]
pub struct ConsumerMetricsSnapshot {
    pub received: u64,
    pub processed: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub dead_lettered: u64,
    pub failed: u64,
    pub currently_processing: u64,
}

#[derive(Debug, Default)]
struct ConsumerMetrics {
    received: AtomicU64,
    processed: AtomicU64,
    acknowledged: AtomicU64,
    rejected: AtomicU64,
    dead_lettered: AtomicU64,
    failed: AtomicU64,
    currently_processing: AtomicU64,
}

impl ConsumerMetrics {
    fn snapshot(&self) -> ConsumerMetricsSnapshot {
        ConsumerMetricsSnapshot {
            received: self.received.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            acknowledged: self.acknowledged.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            dead_lettered: self.dead_lettered.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            currently_processing: self.currently_processing.load(Ordering::SeqCst),
        }
    }
}

/// The decision a handler invocation resolves to. Determines what the
/// owning queue does with the envelope next.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Acknowledged,
    RejectedRequeue,
    RejectedDiscard,
    DeadLettered { reason: String },
}

/// Explicit acknowledgement surface exposed to the handler. If the handler
/// never calls any of these, the outcome is inferred from its `Result` and
/// the consumer's `auto_acknowledge` setting.
#[derive(Debug, Default)]
pub struct MessageContext {
    action: Mutex<Option<DeliveryOutcome>>,
    cancellation: CancellationToken,
}

impl MessageContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            action: Mutex::new(None),
            cancellation,
        }
    }

    pub fn acknowledge(&self) {
        *self.action.lock().expect("message context mutex poisoned") = Some(DeliveryOutcome::Acknowledged);
    }

    pub fn reject(&self, requeue: bool) {
        let outcome = if requeue {
            DeliveryOutcome::RejectedRequeue
        } else {
            DeliveryOutcome::RejectedDiscard
        };
        *self.action.lock().expect("message context mutex poisoned") = Some(outcome);
    }

    pub fn dead_letter(&self, reason: impl Into<String>) {
        *self.action.lock().expect("message context mutex poisoned") =
            Some(DeliveryOutcome::DeadLettered { reason: reason.into() });
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn take_action(&self) -> Option<DeliveryOutcome> {
        self.action.lock().expect("message context mutex poisoned").take()
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), SwitchboardError>> + Send>>;
pub type HandlerFn = Arc<dyn Fn(Envelope, Arc<MessageContext>) -> HandlerFuture + Send + Sync>;

/// A named subscriber bound to a queue or topic subscription, advancing
/// through `Created → Starting → Active ⇄ ProcessingMessage → Stopping →
/// Stopped → Disposed`.
pub struct Consumer {
    id: String,
    state: AtomicU8,
    concurrency: Arc<Semaphore>,
    concurrency_limit: u32,
    retry_policy: RetryPolicyConfig,
    auto_acknowledge: bool,
    handler: HandlerFn,
    metrics: ConsumerMetrics,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Consumer {
    pub fn new(
        id: impl Into<String>,
        concurrent_message_limit: usize,
        auto_acknowledge: bool,
        retry_policy: RetryPolicyConfig,
        handler: HandlerFn,
    ) -> Arc<Self> {
        let concurrency_limit = concurrent_message_limit.max(1) as u32;
        Arc::new(Self {
            id: id.into(),
            state: AtomicU8::new(ConsumerState::Created.as_u8()),
            concurrency: Arc::new(Semaphore::new(concurrency_limit as usize)),
            concurrency_limit,
            retry_policy,
            auto_acknowledge,
            handler,
            metrics: ConsumerMetrics::default(),
            cancellation: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Starting is idempotent: a no-op once Active or beyond Created.
    pub fn start(&self) {
        if self.state() == ConsumerState::Created {
            self.state.store(ConsumerState::Starting.as_u8(), Ordering::SeqCst);
            self.state.store(ConsumerState::Active.as_u8(), Ordering::SeqCst);
            debug!(consumer = %self.id, "consumer started");
        }
    }

    /// Stop is a no-op on a non-started consumer; otherwise waits for the
    /// in-flight deliveries to finish by draining the concurrency semaphore.
    pub async fn stop(&self) {
        let current = self.state();
        if current == ConsumerState::Created || current == ConsumerState::Stopped || current == ConsumerState::Disposed {
            return;
        }
        self.state.store(ConsumerState::Stopping.as_u8(), Ordering::SeqCst);
        self.cancellation.cancel();

        // Waits for every in-flight delivery to release its permit before
        // declaring the consumer Stopped, so it never lingers in
        // ProcessingMessage past Stop returning.
        let _ = self.concurrency.acquire_many(self.concurrency_limit).await;

        self.state.store(ConsumerState::Stopped.as_u8(), Ordering::SeqCst);
        debug!(consumer = %self.id, "consumer stopped");
    }

    pub async fn dispose(&self) {
        self.stop().await;
        self.state.store(ConsumerState::Disposed.as_u8(), Ordering::SeqCst);
    }

    pub fn is_eligible(&self) -> bool {
        self.state() == ConsumerState::Active
    }

    /// Attempts to claim a concurrency slot for one delivery. Returns `None`
    /// if the consumer is not eligible or has no free slot this turn.
    pub fn try_acquire(self: &Arc<Self>) -> Option<OwnedSemaphorePermit> {
        if !self.is_eligible() {
            return None;
        }
        Arc::clone(&self.concurrency).try_acquire_owned().ok()
    }

    pub fn metrics(&self) -> ConsumerMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn retry_policy(&self) -> &RetryPolicyConfig {
        &self.retry_policy
    }

    /// Runs the delivery protocol for one envelope: invokes the handler,
    /// resolves the final outcome, and updates metrics. `envelope.attempts`
    /// must already reflect this delivery (the caller increments it before
    /// invoking).
    pub async fn deliver(self: &Arc<Self>, permit: OwnedSemaphorePermit, envelope: Envelope) -> DeliveryOutcome {
        self.metrics.received.fetch_add(1, Ordering::SeqCst);
        self.metrics.currently_processing.fetch_add(1, Ordering::SeqCst);
        self.state.store(ConsumerState::ProcessingMessage.as_u8(), Ordering::SeqCst);

        let context = Arc::new(MessageContext::new(self.cancellation.child_token()));
        let result = (self.handler)(envelope.clone(), Arc::clone(&context)).await;

        self.metrics.currently_processing.fetch_sub(1, Ordering::SeqCst);
        // Only fall back to Active if nothing else (stop/dispose) moved the
        // state machine on while the handler was running.
        let _ = self.state.compare_exchange(
            ConsumerState::ProcessingMessage.as_u8(),
            ConsumerState::Active.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        drop(permit);

        let outcome = match context.take_action() {
            Some(explicit) => explicit,
            None => match result {
                Ok(()) if self.auto_acknowledge => DeliveryOutcome::Acknowledged,
                Ok(()) => DeliveryOutcome::RejectedDiscard,
                Err(ref error) => self.outcome_for_failure(&envelope, error),
            },
        };

        self.metrics.processed.fetch_add(1, Ordering::SeqCst);
        match &outcome {
            DeliveryOutcome::Acknowledged => {
                self.metrics.acknowledged.fetch_add(1, Ordering::SeqCst);
            }
            DeliveryOutcome::RejectedRequeue | DeliveryOutcome::RejectedDiscard => {
                self.metrics.rejected.fetch_add(1, Ordering::SeqCst);
                if result.is_err() {
                    self.metrics.failed.fetch_add(1, Ordering::SeqCst);
                }
            }
            DeliveryOutcome::DeadLettered { reason } => {
                self.metrics.failed.fetch_add(1, Ordering::SeqCst);
                self.metrics.dead_lettered.fetch_add(1, Ordering::SeqCst);
                warn!(consumer = %self.id, reason = %reason, "envelope dead-lettered");
            }
        }

        outcome
    }

    fn outcome_for_failure(&self, envelope: &Envelope, error: &SwitchboardError) -> DeliveryOutcome {
        if envelope.attempts <= self.retry_policy.max_attempts {
            DeliveryOutcome::RejectedRequeue
        } else {
            DeliveryOutcome::DeadLettered {
                reason: format!("exhausted retries after {} attempts: {}", envelope.attempts, error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use switchboard_shared::{SystemTimeSource, TimeSource};
    use uuid::Uuid;

    fn envelope(attempts: u32) -> Envelope {
        let mut envelope = Envelope::new("Test", vec![], Uuid::now_v7(), SystemTimeSource.now());
        envelope.attempts = attempts;
        envelope
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            RetryPolicyConfig::default(),
            Arc::new(|_e, _ctx| Box::pin(async { Ok(()) })),
        );
        consumer.start();
        consumer.start();
        assert_eq!(consumer.state(), ConsumerState::Active);
    }

    #[tokio::test]
    async fn stop_on_unstarted_consumer_is_noop() {
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            RetryPolicyConfig::default(),
            Arc::new(|_e, _ctx| Box::pin(async { Ok(()) })),
        );
        consumer.stop().await;
        assert_eq!(consumer.state(), ConsumerState::Created);
    }

    #[tokio::test]
    async fn successful_handler_with_auto_ack_is_acknowledged() {
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            RetryPolicyConfig::default(),
            Arc::new(|_e, _ctx| Box::pin(async { Ok(()) })),
        );
        consumer.start();
        let permit = consumer.try_acquire().unwrap();
        let outcome = consumer.deliver(permit, envelope(1)).await;
        assert!(matches!(outcome, DeliveryOutcome::Acknowledged));
        assert_eq!(consumer.metrics().acknowledged, 1);
    }

    #[tokio::test]
    async fn failure_within_retry_budget_requeues() {
        let policy = RetryPolicyConfig {
            max_attempts: 3,
            ..Default::default()
        };
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            policy,
            Arc::new(|_e, _ctx| {
                Box::pin(async { Err(SwitchboardError::TransientFailure { reason: "boom".into() }) })
            }),
        );
        consumer.start();
        let permit = consumer.try_acquire().unwrap();
        let outcome = consumer.deliver(permit, envelope(2)).await;
        assert!(matches!(outcome, DeliveryOutcome::RejectedRequeue));
    }

    #[tokio::test]
    async fn failure_after_retry_budget_dead_letters() {
        let policy = RetryPolicyConfig {
            max_attempts: 3,
            ..Default::default()
        };
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            policy,
            Arc::new(|_e, _ctx| {
                Box::pin(async { Err(SwitchboardError::TransientFailure { reason: "boom".into() }) })
            }),
        );
        consumer.start();
        let permit = consumer.try_acquire().unwrap();
        let outcome = consumer.deliver(permit, envelope(4)).await;
        assert!(matches!(outcome, DeliveryOutcome::DeadLettered { .. }));
    }

    #[tokio::test]
    async fn explicit_context_action_overrides_inferred_outcome() {
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            RetryPolicyConfig::default(),
            Arc::new(|_e, ctx| {
                Box::pin(async move {
                    ctx.dead_letter("poison payload");
                    Ok(())
                })
            }),
        );
        consumer.start();
        let permit = consumer.try_acquire().unwrap();
        let outcome = consumer.deliver(permit, envelope(1)).await;
        assert!(matches!(outcome, DeliveryOutcome::DeadLettered { reason } if reason == "poison payload"));
    }

    #[tokio::test]
    async fn inactive_consumer_refuses_delivery_slot() {
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            RetryPolicyConfig::default(),
            Arc::new(|_e, _ctx| Box::pin(async { Ok(()) })),
        );
        assert!(consumer.try_acquire().is_none());
    }

    #[tokio::test]
    async fn concurrency_limit_bounds_in_flight_acquisitions() {
        let consumer = Consumer::new(
            "c1",
            1,
            true,
            RetryPolicyConfig::default(),
            Arc::new(|_e, _ctx| Box::pin(async { Ok(()) })),
        );
        consumer.start();
        let first = consumer.try_acquire();
        let second = consumer.try_acquire();
        assert!(first.is_some());
        assert!(second.is_none());
        drop(first);

        let counter = AtomicU32::new(0);
        let _ = counter.fetch_add(1, Ordering::SeqCst);
    }
}
