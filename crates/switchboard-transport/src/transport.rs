use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use switchboard_shared::config::QueueConfig;
use switchboard_shared::Timestamp;
use tokio::sync::RwLock;

use crate::consumer::{Consumer, HandlerFn};
use crate::dead_letter::DeadLetterQueue;
use crate::envelope::{Envelope, TransportAddress};
use crate::errors::TransportError;
use crate::queue::ChannelQueue;
use crate::topic::Topic;

#[derive(Debug, Clone)]
pub struct QueueHealth {
    pub name: String,
    pub depth: usize,
    pub capacity: usize,
    pub consumers: usize,
}

#[derive(Debug, Clone)]
pub struct TopicHealth {
    pub name: String,
    pub subscriptions: usize,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub active: bool,
    pub queues: Vec<QueueHealth>,
    pub topics: Vec<TopicHealth>,
    pub pending_messages: usize,
    pub active_consumers: usize,
    pub connected_since: Option<Timestamp>,
}

/// Owns a collection of queues and topics, lazily created on first use of
/// a given address.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn send(&self, address: &TransportAddress, envelope: Envelope) -> Result<(), TransportError>;

    async fn publish(&self, address: &TransportAddress, envelope: Envelope) -> Result<usize, TransportError>;

    async fn subscribe(
        &self,
        address: &TransportAddress,
        consumer_id: &str,
        handler: HandlerFn,
    ) -> Result<Arc<Consumer>, TransportError>;

    async fn health(&self) -> HealthReport;
}

pub struct InMemoryTransport {
    queue_config: QueueConfig,
    connected: AtomicBool,
    connected_since: RwLock<Option<Timestamp>>,
    queues: RwLock<HashMap<String, Arc<ChannelQueue>>>,
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    dead_letter: Arc<DeadLetterQueue>,
    time_source: Arc<dyn switchboard_shared::TimeSource>,
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}

impl InMemoryTransport {
    pub fn new(queue_config: QueueConfig, time_source: Arc<dyn switchboard_shared::TimeSource>) -> Arc<Self> {
        Arc::new(Self {
            queue_config,
            connected: AtomicBool::new(false),
            connected_since: RwLock::new(None),
            queues: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
            dead_letter: Arc::new(DeadLetterQueue::new()),
            time_source,
        })
    }

    pub fn dead_letter_queue(&self) -> Arc<DeadLetterQueue> {
        Arc::clone(&self.dead_letter)
    }

    async fn queue_for(&self, name: &str) -> Arc<ChannelQueue> {
        if let Some(queue) = self.queues.read().await.get(name) {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write().await;
        queues
            .entry(name.to_string())
            .or_insert_with(|| ChannelQueue::new(name.to_string(), self.queue_config.clone(), Arc::clone(&self.dead_letter)))
            .clone()
    }

    async fn topic_for(&self, name: &str) -> Arc<Topic> {
        if let Some(topic) = self.topics.read().await.get(name) {
            return Arc::clone(topic);
        }
        let mut topics = self.topics.write().await;
        topics
            .entry(name.to_string())
            .or_insert_with(|| Topic::new(name.to_string(), self.queue_config.clone(), Arc::clone(&self.dead_letter)))
            .clone()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        *self.connected_since.write().await = Some(self.time_source.now());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        *self.connected_since.write().await = None;
        for queue in self.queues.read().await.values() {
            queue.close().await;
        }
        Ok(())
    }

    async fn send(&self, address: &TransportAddress, envelope: Envelope) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let name = match address {
            TransportAddress::Queue(name) => name,
            _ => return Err(TransportError::Disconnected),
        };
        self.queue_for(name).await.enqueue(envelope).await
    }

    async fn publish(&self, address: &TransportAddress, envelope: Envelope) -> Result<usize, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let name = match address {
            TransportAddress::Topic(name) => name,
            _ => return Err(TransportError::Disconnected),
        };
        self.topic_for(name).await.publish(envelope).await
    }

    async fn subscribe(
        &self,
        address: &TransportAddress,
        consumer_id: &str,
        handler: HandlerFn,
    ) -> Result<Arc<Consumer>, TransportError> {
        let consumer = Consumer::new(
            consumer_id,
            1,
            true,
            switchboard_shared::config::RetryPolicyConfig::default(),
            handler,
        );
        consumer.start();

        match address {
            TransportAddress::Queue(name) => {
                self.queue_for(name).await.attach_consumer(Arc::clone(&consumer)).await;
            }
            TransportAddress::Topic(name) => {
                let topic = self.topic_for(name).await;
                let queue = topic.subscribe(consumer_id).await;
                queue.attach_consumer(Arc::clone(&consumer)).await;
            }
            TransportAddress::DeadLetter(_) => return Err(TransportError::Disconnected),
        }

        Ok(consumer)
    }

    async fn health(&self) -> HealthReport {
        let mut queues = Vec::new();
        let mut pending = 0;
        let mut active_consumers = 0;
        for (name, queue) in self.queues.read().await.iter() {
            let depth = queue.depth().await;
            pending += depth;
            queues.push(QueueHealth {
                name: name.clone(),
                depth,
                capacity: self.queue_config.max_queue_length,
                consumers: 0,
            });
        }

        let mut topics = Vec::new();
        for (name, topic) in self.topics.read().await.iter() {
            let count = topic.subscription_count().await;
            active_consumers += count;
            topics.push(TopicHealth {
                name: name.clone(),
                subscriptions: count,
            });
        }

        HealthReport {
            active: self.connected.load(Ordering::SeqCst),
            queues,
            topics,
            pending_messages: pending,
            active_consumers,
            connected_since: *self.connected_since.read().await,
        }
    }
}
