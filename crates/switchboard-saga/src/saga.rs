use switchboard_shared::Timestamp;

/// One history entry: a state the saga entered plus a snapshot of its data
/// as it stood at that moment. Retained so that a compensation run later
/// sees the data the way it was when the compensated state was entered,
/// not the saga's current (possibly further-mutated) data.
#[derive(Clone)]
pub(crate) struct HistoryEntry<D> {
    pub state: String,
    pub data: D,
}

impl<D: std::fmt::Debug> std::fmt::Debug for HistoryEntry<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("state", &self.state)
            .field("data", &self.data)
            .finish()
    }
}

/// A correlated, persisted state machine instance: `correlation_id`,
/// `current_state`, `version`, `created_at`, `updated_at`, `is_completed`,
/// `is_failed`, `failure_reason`, and user-defined `data`.
#[derive(Clone)]
pub struct Saga<D> {
    pub correlation_id: String,
    pub current_state: String,
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub is_completed: bool,
    pub is_failed: bool,
    pub failure_reason: Option<String>,
    pub data: D,
    pub(crate) history: Vec<HistoryEntry<D>>,
}

impl<D: std::fmt::Debug> std::fmt::Debug for Saga<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Saga")
            .field("correlation_id", &self.correlation_id)
            .field("current_state", &self.current_state)
            .field("version", &self.version)
            .field("is_completed", &self.is_completed)
            .field("is_failed", &self.is_failed)
            .field("failure_reason", &self.failure_reason)
            .field("data", &self.data)
            .finish()
    }
}

impl<D: Clone> Saga<D> {
    pub(crate) fn new(correlation_id: String, initial_state: String, data: D, now: Timestamp) -> Self {
        let history = vec![HistoryEntry { state: initial_state.clone(), data: data.clone() }];
        Self {
            correlation_id,
            current_state: initial_state,
            version: 0,
            created_at: now,
            updated_at: now,
            is_completed: false,
            is_failed: false,
            failure_reason: None,
            data,
            history,
        }
    }
}

impl<D> Saga<D> {
    /// A saga is terminal once completed or failed; further events are
    /// ignored rather than mutating it.
    pub fn is_terminal(&self) -> bool {
        self.is_completed || self.is_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_shared::{SystemTimeSource, TimeSource};

    #[test]
    fn new_saga_starts_at_version_zero_and_not_terminal() {
        let saga = Saga::new("order-1".into(), "Initial".into(), 0u32, SystemTimeSource.now());
        assert_eq!(saga.version, 0);
        assert!(!saga.is_terminal());
        assert_eq!(saga.history.len(), 1);
        assert_eq!(saga.history[0].state, "Initial");
    }

    #[test]
    fn completed_or_failed_saga_is_terminal() {
        let mut saga = Saga::new("order-1".into(), "Initial".into(), 0u32, SystemTimeSource.now());
        assert!(!saga.is_terminal());
        saga.is_completed = true;
        assert!(saga.is_terminal());

        let mut failed = Saga::new("order-2".into(), "Initial".into(), 0u32, SystemTimeSource.now());
        failed.is_failed = true;
        assert!(failed.is_terminal());
    }
}
