use switchboard_shared::{Message, ProcessingContext};

/// Strategy for deriving a deterministic idempotency key from a message
/// and its processing context. Alternative generators may compose
/// additional message properties (a business key embedded in metadata, for
/// instance); the default only uses message identity.
pub trait IdempotencyKeyGenerator: Send + Sync {
    fn generate(&self, message: &dyn Message, ctx: &ProcessingContext) -> String;
}

/// `idempotency:{MessageId}` — keys by message identity alone.
#[derive(Debug, Default)]
pub struct DefaultKeyGenerator;

impl IdempotencyKeyGenerator for DefaultKeyGenerator {
    fn generate(&self, message: &dyn Message, _ctx: &ProcessingContext) -> String {
        format!("idempotency:{}", message.message_id())
    }
}
