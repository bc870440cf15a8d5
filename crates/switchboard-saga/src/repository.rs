use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use switchboard_shared::SwitchboardError;

use crate::saga::Saga;

/// Persists saga instances keyed by correlation id, enforcing optimistic
/// concurrency on save the same way a row-versioned table would: a save
/// whose `version` doesn't match what's stored is rejected rather than
/// silently overwritten.
#[async_trait]
pub trait SagaRepository<D>: Send + Sync
where
    D: Clone + Send + Sync + 'static,
{
    async fn load(&self, correlation_id: &str) -> Result<Option<Saga<D>>, SwitchboardError>;

    /// Persists `saga`. A brand-new saga must arrive with `version == 0`;
    /// an existing one must arrive with the version last handed out by
    /// `load`. On success the stored version is incremented by one. On
    /// mismatch returns `SwitchboardError::ConcurrentSagaUpdate`, leaving
    /// the stored saga untouched.
    async fn save(&self, saga: Saga<D>) -> Result<Saga<D>, SwitchboardError>;

    async fn delete(&self, correlation_id: &str) -> Result<(), SwitchboardError>;
}

/// `DashMap`-backed repository, sharded the way `InMemoryIdempotencyStore`
/// and the handler registries are.
pub struct InMemorySagaRepository<D> {
    sagas: DashMap<String, Saga<D>>,
}

impl<D> std::fmt::Debug for InMemorySagaRepository<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySagaRepository").field("saga_count", &self.sagas.len()).finish()
    }
}

impl<D> Default for InMemorySagaRepository<D> {
    fn default() -> Self {
        Self { sagas: DashMap::new() }
    }
}

impl<D> InMemorySagaRepository<D>
where
    D: Clone + Send + Sync + 'static,
{
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }
}

#[async_trait]
impl<D> SagaRepository<D> for InMemorySagaRepository<D>
where
    D: Clone + Send + Sync + 'static,
{
    async fn load(&self, correlation_id: &str) -> Result<Option<Saga<D>>, SwitchboardError> {
        Ok(self.sagas.get(correlation_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, saga: Saga<D>) -> Result<Saga<D>, SwitchboardError> {
        match self.sagas.entry(saga.correlation_id.clone()) {
            Entry::Vacant(slot) => {
                if saga.version != 0 {
                    return Err(SwitchboardError::ConcurrentSagaUpdate {
                        correlation_id: saga.correlation_id,
                        expected: 0,
                        actual: saga.version,
                    });
                }
                let mut stored = saga;
                stored.version = 1;
                slot.insert(stored.clone());
                Ok(stored)
            }
            Entry::Occupied(mut slot) => {
                let current_version = slot.get().version;
                if saga.version != current_version {
                    return Err(SwitchboardError::ConcurrentSagaUpdate {
                        correlation_id: saga.correlation_id,
                        expected: current_version,
                        actual: saga.version,
                    });
                }
                let mut stored = saga;
                stored.version = current_version + 1;
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn delete(&self, correlation_id: &str) -> Result<(), SwitchboardError> {
        self.sagas.remove(correlation_id);
        Ok(())
    }
}
