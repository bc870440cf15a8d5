use std::sync::Mutex;

use switchboard_shared::Timestamp;

use crate::envelope::Envelope;

/// One envelope that exhausted its retry budget, recorded with the reason
/// it was dead-lettered for diagnostic inspection.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry {
    pub envelope: Envelope,
    pub reason: String,
    pub dead_lettered_at: Timestamp,
}

/// Local dead-letter sink. The default transport routes every dead-lettered
/// envelope here; a durable implementation is out of scope.
#[derive(Debug, Default)]
pub struct DeadLetterQueue {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, envelope: Envelope, reason: String, dead_lettered_at: Timestamp) {
        self.entries.lock().expect("dead letter queue mutex poisoned").push(DeadLetterEntry {
            envelope,
            reason,
            dead_lettered_at,
        });
    }

    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().expect("dead letter queue mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead letter queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
