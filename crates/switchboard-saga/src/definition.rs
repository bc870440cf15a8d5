use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use switchboard_shared::SwitchboardError;

use crate::events::SagaEvent;

/// The per-event mutation a transition applies to the saga's data. Kept as
/// a boxed closure rather than a trait so application code can define
/// transitions inline at the call site, the same way the decorator chain
/// is built from closures rather than a trait per stage.
pub type TransitionAction<D, E> = Arc<dyn Fn(&mut D, &E) -> Result<(), SwitchboardError> + Send + Sync>;

/// One entry in the `(state, event type) -> transition` table: the state
/// the saga moves to, whether arriving there completes the saga, and the
/// action that mutates `Data` as the transition runs.
pub struct Transition<D, E> {
    pub(crate) target_state: String,
    pub(crate) is_terminal: bool,
    pub(crate) action: TransitionAction<D, E>,
}

impl<D, E> Transition<D, E>
where
    E: SagaEvent,
{
    /// A transition to `target_state` that leaves the saga active.
    pub fn to<F>(target_state: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut D, &E) -> Result<(), SwitchboardError> + Send + Sync + 'static,
    {
        Self {
            target_state: target_state.into(),
            is_terminal: false,
            action: Arc::new(action),
        }
    }

    /// A transition to `target_state` that marks the saga completed.
    /// Further events for the saga are then ignored.
    pub fn terminal<F>(target_state: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut D, &E) -> Result<(), SwitchboardError> + Send + Sync + 'static,
    {
        Self {
            target_state: target_state.into(),
            is_terminal: true,
            action: Arc::new(action),
        }
    }
}

impl<D, E> std::fmt::Debug for Transition<D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("target_state", &self.target_state)
            .field("is_terminal", &self.is_terminal)
            .finish()
    }
}

/// A state's armed timeout: the delay to wait once the saga enters the
/// state, and a factory synthesising the timeout event fed back into
/// `SagaOrchestrator::process_event` when the timer fires. The synthetic
/// event is processed under the same transition rules as any other event.
pub struct TimeoutSpec<E> {
    pub(crate) delay: Duration,
    pub(crate) make_event: Arc<dyn Fn(&str) -> E + Send + Sync>,
}

impl<E> TimeoutSpec<E> {
    pub fn new<F>(delay: Duration, make_event: F) -> Self
    where
        F: Fn(&str) -> E + Send + Sync + 'static,
    {
        Self { delay, make_event: Arc::new(make_event) }
    }
}

impl<E> Clone for TimeoutSpec<E> {
    fn clone(&self) -> Self {
        Self { delay: self.delay, make_event: Arc::clone(&self.make_event) }
    }
}

impl<E> std::fmt::Debug for TimeoutSpec<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutSpec").field("delay", &self.delay).finish()
    }
}

/// A compensation receives the data snapshot captured when its state was
/// entered, not the saga's current (possibly further-mutated) data.
pub type Compensation<D> = Arc<dyn Fn(&D) + Send + Sync>;

/// The full definition of a saga type: its state set, initial state,
/// `(state, event) -> transition` table, per-state timeouts and
/// compensations, plus a factory producing a brand-new saga's initial
/// data on the first event seen for an unfamiliar correlation id.
pub struct SagaDefinition<D, E: SagaEvent> {
    pub(crate) initial_state: String,
    pub(crate) initial_data: Arc<dyn Fn() -> D + Send + Sync>,
    pub(crate) transitions: HashMap<(String, &'static str), Transition<D, E>>,
    pub(crate) timeouts: HashMap<String, TimeoutSpec<E>>,
    pub(crate) compensations: HashMap<String, Compensation<D>>,
}

impl<D, E: SagaEvent> std::fmt::Debug for SagaDefinition<D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaDefinition")
            .field("initial_state", &self.initial_state)
            .field("transition_count", &self.transitions.len())
            .field("timeout_count", &self.timeouts.len())
            .field("compensation_count", &self.compensations.len())
            .finish()
    }
}

impl<D, E: SagaEvent> SagaDefinition<D, E> {
    pub fn builder<F>(initial_state: impl Into<String>, initial_data: F) -> SagaDefinitionBuilder<D, E>
    where
        F: Fn() -> D + Send + Sync + 'static,
    {
        SagaDefinitionBuilder {
            initial_state: initial_state.into(),
            initial_data: Arc::new(initial_data),
            transitions: HashMap::new(),
            timeouts: HashMap::new(),
            compensations: HashMap::new(),
        }
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    pub(crate) fn transition_for(&self, state: &str, event_type: &'static str) -> Option<&Transition<D, E>> {
        self.transitions.get(&(state.to_string(), event_type))
    }

    pub(crate) fn timeout_for(&self, state: &str) -> Option<&TimeoutSpec<E>> {
        self.timeouts.get(state)
    }

    pub(crate) fn compensation_for(&self, state: &str) -> Option<&Compensation<D>> {
        self.compensations.get(state)
    }
}

/// Builds a [`SagaDefinition`] up front, at startup, the way
/// `MediatorConfig::assemble` builds the decorator pipeline once and
/// closes over it thereafter.
pub struct SagaDefinitionBuilder<D, E: SagaEvent> {
    initial_state: String,
    initial_data: Arc<dyn Fn() -> D + Send + Sync>,
    transitions: HashMap<(String, &'static str), Transition<D, E>>,
    timeouts: HashMap<String, TimeoutSpec<E>>,
    compensations: HashMap<String, Compensation<D>>,
}

impl<D, E: SagaEvent> SagaDefinitionBuilder<D, E> {
    pub fn on(mut self, state: impl Into<String>, event_type: &'static str, transition: Transition<D, E>) -> Self {
        self.transitions.insert((state.into(), event_type), transition);
        self
    }

    pub fn timeout(mut self, state: impl Into<String>, spec: TimeoutSpec<E>) -> Self {
        self.timeouts.insert(state.into(), spec);
        self
    }

    pub fn compensate<F>(mut self, state: impl Into<String>, compensation: F) -> Self
    where
        F: Fn(&D) + Send + Sync + 'static,
    {
        self.compensations.insert(state.into(), Arc::new(compensation));
        self
    }

    pub fn build(self) -> SagaDefinition<D, E> {
        SagaDefinition {
            initial_state: self.initial_state,
            initial_data: self.initial_data,
            transitions: self.transitions,
            timeouts: self.timeouts,
            compensations: self.compensations,
        }
    }
}
