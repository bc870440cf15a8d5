use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use serde_json::Value as JsonValue;

use crate::errors::SwitchboardError;
use crate::message::Timestamp;
use crate::time::{SystemTimeSource, TimeSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    Success,
    Failure,
}

/// A failure, recorded as a synthetic carrier so replays do not depend on
/// exception identity — only the type name and message survive a round
/// trip through the store.
#[derive(Debug, Clone)]
pub struct FailureDescriptor {
    pub type_name: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IdempotencyResponse {
    pub key: String,
    pub status: IdempotencyStatus,
    pub result: Option<JsonValue>,
    pub failure: Option<FailureDescriptor>,
    pub stored_at: Timestamp,
    pub expires_at: Timestamp,
}

impl IdempotencyResponse {
    fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyResponse>, SwitchboardError>;

    async fn store_success(
        &self,
        key: &str,
        result: Option<JsonValue>,
        ttl: Duration,
    ) -> Result<(), SwitchboardError>;

    async fn store_failure(
        &self,
        key: &str,
        failure: FailureDescriptor,
        ttl: Duration,
    ) -> Result<(), SwitchboardError>;

    async fn exists(&self, key: &str) -> Result<bool, SwitchboardError>;

    /// Eagerly purges expired entries and returns the count removed.
    /// Independent of the lazy expiry performed by `get`/`exists`.
    async fn cleanup_expired(&self) -> Result<usize, SwitchboardError>;
}

/// Sharded concurrent map backing, matching the fan-out concurrency
/// profile of a real idempotency store.
#[derive(Debug)]
pub struct InMemoryIdempotencyStore {
    entries: DashMap<String, IdempotencyResponse>,
    time_source: Arc<dyn TimeSource>,
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            time_source: Arc::new(SystemTimeSource),
        }
    }
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_time_source(time_source: Arc<dyn TimeSource>) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            time_source,
        })
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, key: &str) -> Result<Option<IdempotencyResponse>, SwitchboardError> {
        let now = self.time_source.now();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                drop(entry);
                self.entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value().clone())),
            None => Ok(None),
        }
    }

    async fn store_success(
        &self,
        key: &str,
        result: Option<JsonValue>,
        ttl: Duration,
    ) -> Result<(), SwitchboardError> {
        let now = self.time_source.now();
        self.entries.insert(
            key.to_string(),
            IdempotencyResponse {
                key: key.to_string(),
                status: IdempotencyStatus::Success,
                result,
                failure: None,
                stored_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn store_failure(
        &self,
        key: &str,
        failure: FailureDescriptor,
        ttl: Duration,
    ) -> Result<(), SwitchboardError> {
        let now = self.time_source.now();
        self.entries.insert(
            key.to_string(),
            IdempotencyResponse {
                key: key.to_string(),
                status: IdempotencyStatus::Failure,
                result: None,
                failure: Some(failure),
                stored_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, SwitchboardError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn cleanup_expired(&self) -> Result<usize, SwitchboardError> {
        let now = self.time_source.now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }

        Ok(expired.len())
    }
}
