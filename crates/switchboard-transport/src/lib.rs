//! # switchboard-transport
//!
//! The in-process transport core: envelopes, the two interchangeable queue
//! implementations (channel-backed and ring-buffer), fan-out topics, the
//! consumer lifecycle and delivery protocol, and a dead-letter sink.

pub mod consumer;
pub mod dead_letter;
pub mod envelope;
pub mod errors;
pub mod queue;
pub mod topic;
pub mod transport;

pub use consumer::{Consumer, ConsumerState, DeliveryOutcome, HandlerFn, HandlerFuture, MessageContext};
pub use dead_letter::{DeadLetterEntry, DeadLetterQueue};
pub use envelope::{Envelope, TransportAddress};
pub use errors::TransportError;
pub use queue::{ChannelQueue, RingBufferQueue};

pub use topic::Topic;
pub use transport::{HealthReport, InMemoryTransport, QueueHealth, TopicHealth, Transport};
