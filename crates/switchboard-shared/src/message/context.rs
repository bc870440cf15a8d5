use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use super::{MessageId, Metadata, Timestamp};

/// Per-invocation state threaded through the decorator chain.
///
/// Each decorator may read and annotate the context before delegating to
/// the next stage; nothing here is shared across invocations.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub message_id: MessageId,
    pub correlation_id: Option<String>,
    pub received_at: Timestamp,
    pub attempt: u32,
    pub cancellation: CancellationToken,
    annotations: HashMap<String, JsonValue>,
}

impl ProcessingContext {
    pub fn new(message_id: MessageId, received_at: Timestamp) -> Self {
        Self {
            message_id,
            correlation_id: None,
            received_at,
            attempt: 1,
            cancellation: CancellationToken::new(),
            annotations: HashMap::new(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Called by the retry decorator between attempts.
    pub fn advance_attempt(&mut self) {
        self.attempt += 1;
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: JsonValue) {
        self.annotations.insert(key.into(), value);
    }

    pub fn annotation(&self, key: &str) -> Option<&JsonValue> {
        self.annotations.get(key)
    }

    pub fn into_metadata(self) -> Metadata {
        self.annotations
    }
}
