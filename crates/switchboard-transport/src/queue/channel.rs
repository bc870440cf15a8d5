use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use switchboard_shared::config::{OverflowPolicy, QueueConfig};
use switchboard_shared::{SystemTimeSource, TimeSource};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::consumer::Consumer;
use crate::dead_letter::DeadLetterQueue;
use crate::envelope::Envelope;
use crate::errors::TransportError;

/// Bounded, thread-safe FIFO with round-robin dispatch to competing
/// consumers.
///
/// Named for the role it plays (a notify-driven bounded buffer a producer
/// sends into and consumers compete to drain), not because it wraps a
/// literal `tokio::sync::mpsc` channel: reject-with-requeue must push back
/// onto the head of the very buffer consumers pull from, which an `mpsc`
/// receiver cannot do. The buffer is a plain `VecDeque` behind a mutex,
/// woken by a `Notify`, giving the same externally observable semantics
/// the name promises.
pub struct ChannelQueue {
    name: String,
    config: QueueConfig,
    buffer: Mutex<VecDeque<Envelope>>,
    has_messages: Notify,
    space_available: Notify,
    consumers: Mutex<Vec<Arc<Consumer>>>,
    cursor: AtomicUsize,
    dead_letter: Arc<DeadLetterQueue>,
    closed: AtomicBool,
    dispatch_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChannelQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelQueue").field("name", &self.name).finish()
    }
}

impl ChannelQueue {
    pub fn new(name: impl Into<String>, config: QueueConfig, dead_letter: Arc<DeadLetterQueue>) -> Arc<Self> {
        let queue = Arc::new(Self {
            name: name.into(),
            config,
            buffer: Mutex::new(VecDeque::new()),
            has_messages: Notify::new(),
            space_available: Notify::new(),
            consumers: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            dead_letter,
            closed: AtomicBool::new(false),
            dispatch_handle: std::sync::Mutex::new(None),
        });
        queue.clone().spawn_dispatch_loop();
        queue
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn depth(&self) -> usize {
        self.buffer.lock().await.len()
    }

    pub async fn attach_consumer(&self, consumer: Arc<Consumer>) {
        self.consumers.lock().await.push(consumer);
        self.has_messages.notify_waiters();
    }

    pub async fn detach_consumer(&self, id: &str) {
        self.consumers.lock().await.retain(|c| c.id() != id);
    }

    pub async fn enqueue(&self, envelope: Envelope) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::QueueClosed);
        }

        loop {
            let mut buffer = self.buffer.lock().await;
            if buffer.len() < self.config.max_queue_length {
                buffer.push_back(envelope);
                drop(buffer);
                self.has_messages.notify_waiters();
                return Ok(());
            }

            match self.config.overflow_policy {
                OverflowPolicy::Fail => return Err(TransportError::QueueFull),
                OverflowPolicy::DropNewest => {
                    debug!(queue = %self.name, "dropping newest envelope, queue at capacity");
                    return Ok(());
                }
                OverflowPolicy::DropOldest => {
                    buffer.pop_front();
                    buffer.push_back(envelope);
                    drop(buffer);
                    self.has_messages.notify_waiters();
                    return Ok(());
                }
                OverflowPolicy::Block => {
                    drop(buffer);
                    self.space_available.notified().await;
                }
            }
        }
    }

    /// Returns the envelope to the head of the buffer, preserving ordering
    /// relative to other requeued envelopes.
    async fn requeue_head(&self, envelope: Envelope) {
        let mut buffer = self.buffer.lock().await;
        buffer.push_front(envelope);
        drop(buffer);
        self.has_messages.notify_waiters();
    }

    fn spawn_dispatch_loop(self: Arc<Self>) {
        let loop_queue = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            loop {
                if loop_queue.closed.load(Ordering::SeqCst) {
                    return;
                }

                let dispatched = loop_queue.try_dispatch_one().await;
                if !dispatched {
                    tokio::select! {
                        _ = loop_queue.has_messages.notified() => {}
                        _ = tokio::time::sleep(std::time::Duration::from_millis(5)) => {}
                    }
                }
            }
        });
        *self.dispatch_handle.lock().expect("dispatch handle mutex poisoned") = Some(handle);
    }

    /// Attempts one dispatch cycle: pick the next eligible consumer in
    /// round-robin order and hand it the head envelope. Returns whether a
    /// dispatch happened.
    async fn try_dispatch_one(self: &Arc<Self>) -> bool {
        let consumers = self.consumers.lock().await.clone();
        if consumers.is_empty() {
            return false;
        }

        let len = consumers.len();
        let start = self.cursor.load(Ordering::SeqCst) % len;

        for offset in 0..len {
            let index = (start + offset) % len;
            let consumer = &consumers[index];
            if let Some(permit) = consumer.try_acquire() {
                let mut buffer = self.buffer.lock().await;
                let Some(mut envelope) = buffer.pop_front() else {
                    drop(buffer);
                    drop(permit);
                    return false;
                };
                drop(buffer);
                self.space_available.notify_waiters();

                envelope.record_delivery_attempt();
                self.cursor.store((index + 1) % len, Ordering::SeqCst);

                let queue = Arc::clone(self);
                let consumer = Arc::clone(consumer);
                tokio::spawn(async move {
                    queue.run_delivery(consumer, permit, envelope).await;
                });
                return true;
            }
        }
        false
    }

    async fn run_delivery(
        self: Arc<Self>,
        consumer: Arc<Consumer>,
        permit: tokio::sync::OwnedSemaphorePermit,
        envelope: Envelope,
    ) {
        use crate::consumer::DeliveryOutcome;

        let retry_policy = consumer.retry_policy().clone();
        let outcome = consumer.deliver(permit, envelope.clone()).await;

        match outcome {
            DeliveryOutcome::Acknowledged | DeliveryOutcome::RejectedDiscard => {}
            DeliveryOutcome::RejectedRequeue => {
                let delay = retry_policy.delay_for(envelope.attempts);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                self.requeue_head(envelope).await;
            }
            DeliveryOutcome::DeadLettered { reason } => {
                self.dead_letter.record(envelope, reason, SystemTimeSource.now());
            }
        }
    }

    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.has_messages.notify_waiters();
        let handle = self.dispatch_handle.lock().expect("dispatch handle mutex poisoned").take();
        if let Some(handle) = handle {
            handle.abort();
        }
        info!(queue = %self.name, "queue closed");
    }
}
