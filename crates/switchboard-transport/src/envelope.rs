use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use switchboard_shared::{MessageId, Timestamp};

/// Transport-level wrapper around an opaque payload plus metadata. The unit
/// of transport; does not depend on the message object graph above it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: String,
    pub body: Vec<u8>,
    pub message_id: MessageId,
    pub attributes: HashMap<String, String>,
    pub attempts: u32,
    pub enqueued_at: Timestamp,
}

impl Envelope {
    pub fn new(message_type: impl Into<String>, body: Vec<u8>, message_id: MessageId, enqueued_at: Timestamp) -> Self {
        Self {
            message_type: message_type.into(),
            body,
            message_id,
            attributes: HashMap::new(),
            attempts: 0,
            enqueued_at,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn record_delivery_attempt(&mut self) {
        self.attempts += 1;
    }
}

/// Tagged union of transport destinations. Equality and hashing are by
/// kind plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportAddress {
    Queue(String),
    Topic(String),
    DeadLetter(String),
}

impl TransportAddress {
    pub fn name(&self) -> &str {
        match self {
            TransportAddress::Queue(name)
            | TransportAddress::Topic(name)
            | TransportAddress::DeadLetter(name) => name,
        }
    }
}
