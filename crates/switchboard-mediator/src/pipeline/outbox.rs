use std::sync::Arc;

use serde_json::Value as JsonValue;
use switchboard_shared::storage::{OutboxEntry, OutboxStatus, OutboxStorage};
use switchboard_shared::{ProcessingResult, TimeSource};

use super::{Step, StepFuture};
use crate::pipeline::Decorator;

/// Pipeline stage 7: persists outgoing messages a handler staged during
/// its own side effects, atomically with having already succeeded, so a
/// crash between "handler committed" and "message published" cannot lose
/// the outgoing message — a background publisher later drains the outbox.
///
/// Handlers stage outgoing messages by annotating the context under the
/// `"outbox"` key with a JSON array of `{"destination": ..., "payload":
/// ...}` objects before returning; this decorator reads that annotation
/// only on [`ProcessingResult::Success`] and clears nothing on failure, so
/// a retried attempt re-stages its own outbox entries from scratch.
pub struct OutboxDecorator {
    storage: Arc<dyn OutboxStorage>,
    time_source: Arc<dyn TimeSource>,
}

impl OutboxDecorator {
    pub fn new(storage: Arc<dyn OutboxStorage>, time_source: Arc<dyn TimeSource>) -> Self {
        Self { storage, time_source }
    }
}

const OUTBOX_ANNOTATION_KEY: &str = "outbox";

impl Decorator for OutboxDecorator {
    fn wrap(&self, next: Step) -> Step {
        let storage = Arc::clone(&self.storage);
        let time_source = Arc::clone(&self.time_source);

        Arc::new(move |message, ctx, cancel| -> StepFuture {
            let next = Arc::clone(&next);
            let storage = Arc::clone(&storage);
            let time_source = Arc::clone(&time_source);

            Box::pin(async move {
                let (ctx, result) = next(message, ctx, cancel).await;

                if result.is_success() {
                    let message_id = ctx.message_id;
                    if let Some(JsonValue::Array(staged)) = ctx.annotation(OUTBOX_ANNOTATION_KEY) {
                        for entry in staged {
                            let destination = entry
                                .get("destination")
                                .and_then(JsonValue::as_str)
                                .unwrap_or_default()
                                .to_string();
                            let payload = entry.get("payload").cloned().unwrap_or(JsonValue::Null);

                            let _ = storage
                                .append(OutboxEntry {
                                    message_id,
                                    destination,
                                    payload,
                                    status: OutboxStatus::Pending,
                                    attempts: 0,
                                    created_at: time_source.now(),
                                })
                                .await;
                        }
                    }
                }

                (ctx, result)
            })
        })
    }
}
