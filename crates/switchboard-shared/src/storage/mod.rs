//! Abstract persistence contracts and in-memory reference implementations
//! for messages, the outbox, the inbox, and idempotency responses.

mod idempotency;
mod inbox;
mod message_store;
mod outbox;

pub use idempotency::{
    FailureDescriptor, IdempotencyResponse, IdempotencyStatus, IdempotencyStore,
    InMemoryIdempotencyStore,
};
pub use inbox::{InMemoryInboxStorage, InboxStorage};
pub use message_store::{InMemoryMessageStorage, MessageStorage, StoredMessage};
pub use outbox::{InMemoryOutboxStorage, OutboxEntry, OutboxStatus, OutboxStorage};
