use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value as JsonValue;

use crate::errors::SwitchboardError;
use crate::message::{MessageId, Metadata, Timestamp};

/// Opaque, storage-level representation of a message — the storage layer
/// does not know about concrete message types, only their serialized
/// payload and identity.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message_id: MessageId,
    pub message_type: String,
    pub payload: JsonValue,
    pub correlation_id: Option<String>,
    pub metadata: Option<Metadata>,
    pub stored_at: Timestamp,
}

#[async_trait]
pub trait MessageStorage: Send + Sync {
    async fn store(&self, message: StoredMessage) -> Result<(), SwitchboardError>;

    async fn retrieve(&self, id: MessageId) -> Result<Option<StoredMessage>, SwitchboardError>;

    /// Returns every stored message matching the predicate. Reference
    /// implementation scans in insertion order; a durable implementation
    /// would typically push the predicate down to a query.
    async fn query(
        &self,
        predicate: &(dyn Fn(&StoredMessage) -> bool + Send + Sync),
    ) -> Result<Vec<StoredMessage>, SwitchboardError>;
}

#[derive(Debug, Default)]
pub struct InMemoryMessageStorage {
    messages: DashMap<MessageId, StoredMessage>,
}

impl InMemoryMessageStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl MessageStorage for InMemoryMessageStorage {
    async fn store(&self, message: StoredMessage) -> Result<(), SwitchboardError> {
        self.messages.insert(message.message_id, message);
        Ok(())
    }

    async fn retrieve(&self, id: MessageId) -> Result<Option<StoredMessage>, SwitchboardError> {
        Ok(self.messages.get(&id).map(|entry| entry.value().clone()))
    }

    async fn query(
        &self,
        predicate: &(dyn Fn(&StoredMessage) -> bool + Send + Sync),
    ) -> Result<Vec<StoredMessage>, SwitchboardError> {
        Ok(self
            .messages
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{SystemTimeSource, TimeSource};
    use uuid::Uuid;

    fn sample(message_type: &str) -> StoredMessage {
        StoredMessage {
            message_id: Uuid::now_v7(),
            message_type: message_type.to_string(),
            payload: JsonValue::Null,
            correlation_id: None,
            metadata: None,
            stored_at: SystemTimeSource.now(),
        }
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let storage = InMemoryMessageStorage::new();
        let message = sample("OrderPlaced");
        let id = message.message_id;

        storage.store(message).await.unwrap();
        let retrieved = storage.retrieve(id).await.unwrap();

        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().message_type, "OrderPlaced");
    }

    #[tokio::test]
    async fn retrieve_missing_returns_none() {
        let storage = InMemoryMessageStorage::new();
        assert!(storage.retrieve(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_filters_by_predicate() {
        let storage = InMemoryMessageStorage::new();
        storage.store(sample("OrderPlaced")).await.unwrap();
        storage.store(sample("OrderCancelled")).await.unwrap();

        let placed = storage
            .query(&|m: &StoredMessage| m.message_type == "OrderPlaced")
            .await
            .unwrap();

        assert_eq!(placed.len(), 1);
    }
}
