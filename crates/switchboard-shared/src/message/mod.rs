//! # Message Model
//!
//! Immutable value carriers for commands, queries, and events, plus the
//! per-invocation context and result type threaded through the processing
//! pipeline.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

mod context;
mod result;

pub use context::ProcessingContext;
pub use result::ProcessingResult;

/// Unique identity assigned to every message at construction.
pub type MessageId = Uuid;

/// UTC instant a message was constructed, assigned via the injected
/// [`crate::time::TimeSource`] — never `Utc::now()` directly.
pub type Timestamp = DateTime<Utc>;

/// Free-form attribute bag carried by a message.
///
/// A JSON value rather than a plain string because attribute bags and
/// saga data both benefit from structured values (arrays, nested objects).
pub type Metadata = HashMap<String, JsonValue>;

/// Common identity and provenance shared by every message kind.
///
/// Implemented by the `#[derive(Message)]`-free hand-written message types
/// below; a real codegen layer (source-generator territory, out of scope
/// here) would typically derive this.
pub trait Message: fmt::Debug + Send + Sync {
    /// Unique identity, assigned once at construction.
    fn message_id(&self) -> MessageId;

    /// UTC instant the message was constructed.
    fn timestamp(&self) -> Timestamp;

    /// Identifier propagated through a causal chain of related messages.
    fn correlation_id(&self) -> Option<&str>;

    /// The message that caused this one to be emitted, if any.
    fn causation_id(&self) -> Option<MessageId>;

    /// Arbitrary string-keyed metadata attached at construction.
    fn metadata(&self) -> Option<&Metadata>;

    /// Structural validation run by the pipeline's validation decorator
    /// before any side effect. Concrete message types override this with
    /// hand-written checks; defaults to always-valid.
    fn validate(&self) -> Result<(), crate::errors::SwitchboardError> {
        Ok(())
    }
}

/// Marker for commands that may be fire-and-forget or carry a typed response.
pub trait Command: Message {}

/// A command whose handler returns a typed response.
pub trait CommandWithResponse<R>: Command {}

/// A query always carries a typed response.
pub trait Query<R>: Message {}

/// Events carry no response; they are published to zero or more handlers.
pub trait Event: Message {}

/// Minimal concrete [`Message`] implementation usable directly or as a base
/// for hand-written domain messages (`struct MyCommand { envelope:
/// MessageEnvelope, field: T }`).
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub message_id: MessageId,
    pub timestamp: Timestamp,
    pub correlation_id: Option<String>,
    pub causation_id: Option<MessageId>,
    pub metadata: Option<Metadata>,
}

impl MessageEnvelope {
    /// Construct a new envelope, assigning identity and timestamp from the
    /// given time source and id generator.
    pub fn new(message_id: MessageId, timestamp: Timestamp) -> Self {
        Self {
            message_id,
            timestamp,
            correlation_id: None,
            causation_id: None,
            metadata: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_causation_id(mut self, causation_id: MessageId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl Message for MessageEnvelope {
    fn message_id(&self) -> MessageId {
        self.message_id
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    fn causation_id(&self) -> Option<MessageId> {
        self.causation_id
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

/// Type-erased wrapper used by the processor registries to store a message
/// of any concrete type behind a single value while preserving its runtime
/// type for handler resolution.
pub type AnyMessage = Box<dyn Any + Send>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{SystemTimeSource, TimeSource};

    #[test]
    fn envelope_carries_identity_and_timestamp() {
        let ts = SystemTimeSource.now();
        let id = Uuid::now_v7();
        let envelope = MessageEnvelope::new(id, ts);

        assert_eq!(envelope.message_id(), id);
        assert_eq!(envelope.timestamp(), ts);
        assert!(envelope.correlation_id().is_none());
        assert!(envelope.causation_id().is_none());
    }

    #[test]
    fn envelope_builder_sets_optional_fields() {
        let envelope = MessageEnvelope::new(Uuid::now_v7(), SystemTimeSource.now())
            .with_correlation_id("order-42")
            .with_causation_id(Uuid::now_v7());

        assert_eq!(envelope.correlation_id(), Some("order-42"));
        assert!(envelope.causation_id().is_some());
    }
}
