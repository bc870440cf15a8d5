//! # switchboard-shared
//!
//! Message model, storage contracts, configuration types, the shared error
//! enum, the injected time source, and the circuit breaker resilience
//! primitives used across the switchboard workspace.

pub mod config;
pub mod errors;
pub mod message;
pub mod resilience;
pub mod storage;
pub mod time;

pub use errors::SwitchboardError;
pub use message::{
    AnyMessage, Command, CommandWithResponse, Event, Message, MessageEnvelope, MessageId,
    Metadata, ProcessingContext, ProcessingResult, Query, Timestamp,
};
#[cfg(any(test, feature = "test-utils"))]
pub use time::TestTimeSource;
pub use time::{SystemTimeSource, TimeSource};
