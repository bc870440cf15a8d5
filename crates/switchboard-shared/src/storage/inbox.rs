use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;

use crate::errors::SwitchboardError;
use crate::message::MessageId;

/// Tracks transport-level message identity to dedupe at-least-once
/// deliveries, independent of the business-key-based idempotency store.
#[async_trait]
pub trait InboxStorage: Send + Sync {
    async fn add(&self, message_id: MessageId) -> Result<(), SwitchboardError>;

    async fn exists(&self, message_id: MessageId) -> Result<bool, SwitchboardError>;
}

#[derive(Debug, Default)]
pub struct InMemoryInboxStorage {
    seen: DashSet<MessageId>,
}

impl InMemoryInboxStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl InboxStorage for InMemoryInboxStorage {
    async fn add(&self, message_id: MessageId) -> Result<(), SwitchboardError> {
        self.seen.insert(message_id);
        Ok(())
    }

    async fn exists(&self, message_id: MessageId) -> Result<bool, SwitchboardError> {
        Ok(self.seen.contains(&message_id))
    }
}
