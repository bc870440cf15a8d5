use std::sync::Arc;

use dashmap::DashMap;
use switchboard_shared::{SwitchboardError, TimeSource};
use tracing::{debug, warn};

use crate::definition::SagaDefinition;
use crate::errors::SagaError;
use crate::events::SagaEvent;
use crate::repository::SagaRepository;
use crate::saga::Saga;

/// How many times `process_event` reloads and retries a transition after
/// losing an optimistic-concurrency race before giving up.
const DEFAULT_CONCURRENCY_RETRY_CAP: u32 = 5;

/// Drives sagas of one type through their definition: loads or creates the
/// saga for an event's correlation id, applies the matching transition (if
/// any), persists the result under optimistic concurrency, runs
/// compensations on failure, and arms or cancels the resulting state's
/// timer.
pub struct SagaOrchestrator<D, E>
where
    D: Clone + Send + Sync + 'static,
    E: SagaEvent,
{
    definition: Arc<SagaDefinition<D, E>>,
    repository: Arc<dyn SagaRepository<D>>,
    time_source: Arc<dyn TimeSource>,
    correlation_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    timers: DashMap<String, tokio::task::JoinHandle<()>>,
    retry_cap: u32,
}

impl<D, E> std::fmt::Debug for SagaOrchestrator<D, E>
where
    D: Clone + Send + Sync + 'static,
    E: SagaEvent,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaOrchestrator")
            .field("definition", &self.definition)
            .field("active_timers", &self.timers.len())
            .field("retry_cap", &self.retry_cap)
            .finish()
    }
}

impl<D, E> SagaOrchestrator<D, E>
where
    D: Clone + Send + Sync + 'static,
    E: SagaEvent,
{
    pub fn new(
        definition: SagaDefinition<D, E>,
        repository: Arc<dyn SagaRepository<D>>,
        time_source: Arc<dyn TimeSource>,
    ) -> Arc<Self> {
        Self::with_retry_cap(definition, repository, time_source, DEFAULT_CONCURRENCY_RETRY_CAP)
    }

    pub fn with_retry_cap(
        definition: SagaDefinition<D, E>,
        repository: Arc<dyn SagaRepository<D>>,
        time_source: Arc<dyn TimeSource>,
        retry_cap: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            definition: Arc::new(definition),
            repository,
            time_source,
            correlation_locks: DashMap::new(),
            timers: DashMap::new(),
            retry_cap,
        })
    }

    fn lock_for(&self, correlation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.correlation_locks.entry(correlation_id.to_string()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }

    async fn load_or_create(&self, correlation_id: &str) -> Result<Saga<D>, SwitchboardError> {
        if let Some(saga) = self.repository.load(correlation_id).await? {
            return Ok(saga);
        }
        let data = (self.definition.initial_data)();
        Ok(Saga::new(
            correlation_id.to_string(),
            self.definition.initial_state().to_string(),
            data,
            self.time_source.now(),
        ))
    }

    /// Processes one event: loads or creates the saga for its correlation
    /// id, applies the matching transition, and persists the result. A
    /// lost optimistic-concurrency race reloads the saga and retries the
    /// same event, up to `retry_cap` times, before giving up with
    /// [`SagaError::RetryBudgetExceeded`].
    pub async fn process_event(self: &Arc<Self>, event: E) -> Result<Saga<D>, SagaError> {
        let correlation_id = event.correlation_id().to_string();
        let lock = self.lock_for(&correlation_id);
        let _guard = lock.lock().await;

        let mut attempt = 0u32;
        loop {
            let saga = self.load_or_create(&correlation_id).await?;
            match self.apply_and_save(saga, &event).await {
                Ok(saga) => {
                    self.rearm_timer_if_any(&saga);
                    return Ok(saga);
                }
                Err(SwitchboardError::ConcurrentSagaUpdate { .. }) if attempt < self.retry_cap => {
                    attempt += 1;
                    debug!(correlation_id = %correlation_id, attempt, "retrying saga transition after concurrent update");
                    continue;
                }
                Err(SwitchboardError::ConcurrentSagaUpdate { .. }) => {
                    return Err(SagaError::RetryBudgetExceeded { correlation_id, retry_cap: self.retry_cap });
                }
                Err(other) => return Err(SagaError::Shared(other)),
            }
        }
    }

    async fn apply_and_save(&self, saga: Saga<D>, event: &E) -> Result<Saga<D>, SwitchboardError> {
        if saga.is_terminal() {
            return Ok(saga);
        }

        let Some(transition) = self.definition.transition_for(&saga.current_state, event.event_type()) else {
            debug!(
                correlation_id = %saga.correlation_id,
                state = %saga.current_state,
                event_type = event.event_type(),
                "no transition registered, ignoring event",
            );
            return Ok(saga);
        };

        let mut next = saga.clone();
        match (transition.action)(&mut next.data, event) {
            Ok(()) => {
                next.current_state = transition.target_state.clone();
                next.updated_at = self.time_source.now();
                next.history.push(crate::saga::HistoryEntry { state: next.current_state.clone(), data: next.data.clone() });
                if transition.is_terminal {
                    next.is_completed = true;
                }
                self.repository.save(next).await
            }
            Err(failure) => {
                self.run_compensations(&saga);
                let mut failed = saga;
                failed.is_failed = true;
                failed.failure_reason = Some(failure.to_string());
                failed.updated_at = self.time_source.now();
                self.repository.save(failed).await
            }
        }
    }

    /// Runs the compensation registered for the current state and every
    /// previously-visited state, in reverse visitation order, each
    /// receiving the data snapshot captured when that state was entered.
    fn run_compensations(&self, saga: &Saga<D>) {
        for entry in saga.history.iter().rev() {
            if let Some(compensation) = self.definition.compensation_for(&entry.state) {
                warn!(correlation_id = %saga.correlation_id, state = %entry.state, "running compensation");
                compensation(&entry.data);
            }
        }
    }

    fn cancel_timer(&self, correlation_id: &str) {
        if let Some((_, handle)) = self.timers.remove(correlation_id) {
            handle.abort();
        }
    }

    fn rearm_timer_if_any(self: &Arc<Self>, saga: &Saga<D>) {
        self.cancel_timer(&saga.correlation_id);

        if saga.is_terminal() {
            return;
        }

        let Some(spec) = self.definition.timeout_for(&saga.current_state) else {
            return;
        };

        let delay = spec.delay.to_std().unwrap_or(std::time::Duration::ZERO);
        let make_event = spec.make_event.clone();
        let correlation_id = saga.correlation_id.clone();
        let orchestrator = Arc::clone(self);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let event = make_event(&correlation_id);
            if let Err(error) = orchestrator.process_event(event).await {
                warn!(correlation_id = %correlation_id, %error, "timeout event processing failed");
            }
        });

        self.timers.insert(saga.correlation_id.clone(), handle);
    }

    /// Aborts all outstanding timers. Call on shutdown so no orphaned
    /// background task keeps firing after the orchestrator is dropped.
    pub async fn shutdown(&self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Transition;
    use crate::repository::InMemorySagaRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchboard_shared::SystemTimeSource;

    #[derive(Debug, Clone)]
    enum OrderEvent {
        Start { correlation_id: String },
        Ship { correlation_id: String },
        Fail { correlation_id: String },
        Timeout { correlation_id: String },
    }

    impl SagaEvent for OrderEvent {
        fn event_type(&self) -> &'static str {
            match self {
                OrderEvent::Start { .. } => "Start",
                OrderEvent::Ship { .. } => "Ship",
                OrderEvent::Fail { .. } => "Fail",
                OrderEvent::Timeout { .. } => "Timeout",
            }
        }

        fn correlation_id(&self) -> &str {
            match self {
                OrderEvent::Start { correlation_id }
                | OrderEvent::Ship { correlation_id }
                | OrderEvent::Fail { correlation_id }
                | OrderEvent::Timeout { correlation_id } => correlation_id,
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    struct OrderData {
        items_reserved: u32,
        shipped: bool,
    }

    fn basic_definition() -> SagaDefinition<OrderData, OrderEvent> {
        SagaDefinition::builder("Initial", OrderData::default)
            .on(
                "Initial",
                "Start",
                Transition::to("Started", |data, _event| {
                    data.items_reserved = 1;
                    Ok(())
                }),
            )
            .on(
                "Started",
                "Ship",
                Transition::terminal("Completed", |data, _event| {
                    data.shipped = true;
                    Ok(())
                }),
            )
            .build()
    }

    fn orchestrator_with(definition: SagaDefinition<OrderData, OrderEvent>) -> Arc<SagaOrchestrator<OrderData, OrderEvent>> {
        SagaOrchestrator::new(definition, InMemorySagaRepository::new(), Arc::new(SystemTimeSource))
    }

    #[tokio::test]
    async fn saga_progresses_from_initial_to_completed() {
        let orchestrator = orchestrator_with(basic_definition());

        let saga = orchestrator.process_event(OrderEvent::Start { correlation_id: "order-1".into() }).await.unwrap();
        assert_eq!(saga.current_state, "Started");
        assert!(!saga.is_completed);

        let saga = orchestrator.process_event(OrderEvent::Ship { correlation_id: "order-1".into() }).await.unwrap();
        assert_eq!(saga.current_state, "Completed");
        assert!(saga.is_completed);
        assert!(saga.data.shipped);
    }

    #[tokio::test]
    async fn events_after_completion_are_ignored() {
        let orchestrator = orchestrator_with(basic_definition());
        orchestrator.process_event(OrderEvent::Start { correlation_id: "order-1".into() }).await.unwrap();
        orchestrator.process_event(OrderEvent::Ship { correlation_id: "order-1".into() }).await.unwrap();

        let saga = orchestrator.process_event(OrderEvent::Ship { correlation_id: "order-1".into() }).await.unwrap();
        assert_eq!(saga.current_state, "Completed");
        assert_eq!(saga.version, 2);
    }

    #[tokio::test]
    async fn unmatched_event_leaves_the_saga_unchanged() {
        let orchestrator = orchestrator_with(basic_definition());
        let saga = orchestrator.process_event(OrderEvent::Ship { correlation_id: "order-1".into() }).await.unwrap();
        assert_eq!(saga.current_state, "Initial");
    }

    #[tokio::test]
    async fn transition_failure_runs_compensation_and_marks_the_saga_failed() {
        let compensated_states = Arc::new(std::sync::Mutex::new(Vec::new()));
        let states_for_compensation = Arc::clone(&compensated_states);
        let states_for_compensation_2 = Arc::clone(&compensated_states);

        let definition = SagaDefinition::builder("Initial", OrderData::default)
            .on(
                "Initial",
                "Start",
                Transition::to("Started", |data, _event| {
                    data.items_reserved = 1;
                    Ok(())
                }),
            )
            .on(
                "Started",
                "Ship",
                Transition::to("Shipping", |_data, _event| {
                    Err(SwitchboardError::TransientFailure { reason: "carrier unavailable".into() })
                }),
            )
            .compensate("Started", move |data: &OrderData| {
                states_for_compensation.lock().unwrap().push(("Started", data.items_reserved));
            })
            .compensate("Initial", move |data: &OrderData| {
                states_for_compensation_2.lock().unwrap().push(("Initial", data.items_reserved));
            })
            .build();

        let orchestrator = orchestrator_with(definition);
        orchestrator.process_event(OrderEvent::Start { correlation_id: "order-1".into() }).await.unwrap();
        let saga = orchestrator.process_event(OrderEvent::Ship { correlation_id: "order-1".into() }).await.unwrap();

        assert!(saga.is_failed);
        assert!(saga.failure_reason.is_some());

        let recorded = compensated_states.lock().unwrap();
        assert_eq!(recorded.as_slice(), &[("Started", 1), ("Initial", 0)]);
    }

    #[tokio::test]
    async fn timeout_fires_and_advances_the_saga() {
        let definition = SagaDefinition::builder("Initial", OrderData::default)
            .on(
                "Initial",
                "Start",
                Transition::to("Started", |data, _event| {
                    data.items_reserved = 1;
                    Ok(())
                }),
            )
            .timeout(
                "Started",
                crate::definition::TimeoutSpec::new(chrono::Duration::milliseconds(20), |correlation_id| OrderEvent::Timeout {
                    correlation_id: correlation_id.to_string(),
                }),
            )
            .on("Started", "Timeout", Transition::terminal("Abandoned", |_data, _event| Ok(())))
            .build();

        let orchestrator = orchestrator_with(definition);
        orchestrator.process_event(OrderEvent::Start { correlation_id: "order-1".into() }).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let saga = orchestrator.repository.load("order-1").await.unwrap().unwrap();
        assert_eq!(saga.current_state, "Abandoned");
        assert!(saga.is_completed);
    }

    #[tokio::test]
    async fn concurrent_processing_of_the_same_correlation_id_is_serialized() {
        let orchestrator = orchestrator_with(basic_definition());
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let orchestrator = Arc::clone(&orchestrator);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                orchestrator.process_event(OrderEvent::Start { correlation_id: "order-1".into() }).await.unwrap();
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let b = {
            let orchestrator = Arc::clone(&orchestrator);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                orchestrator.process_event(OrderEvent::Ship { correlation_id: "order-1".into() }).await.unwrap();
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        a.await.unwrap();
        b.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_aborts_outstanding_timers() {
        let definition = SagaDefinition::builder("Initial", OrderData::default)
            .on("Initial", "Start", Transition::to("Started", |_data, _event| Ok(())))
            .timeout(
                "Started",
                crate::definition::TimeoutSpec::new(chrono::Duration::seconds(30), |correlation_id| OrderEvent::Timeout {
                    correlation_id: correlation_id.to_string(),
                }),
            )
            .build();

        let orchestrator = orchestrator_with(definition);
        orchestrator.process_event(OrderEvent::Start { correlation_id: "order-1".into() }).await.unwrap();
        assert_eq!(orchestrator.timers.len(), 1);

        orchestrator.shutdown().await;
        assert_eq!(orchestrator.timers.len(), 0);
    }
}
