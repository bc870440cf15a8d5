use std::sync::Arc;

use switchboard_shared::config::QueueConfig;
use tokio::sync::RwLock;
use tracing::warn;

use crate::consumer::Consumer;
use crate::dead_letter::DeadLetterQueue;
use crate::envelope::Envelope;
use crate::errors::TransportError;
use crate::queue::ChannelQueue;

/// A set of named subscriptions, each backed by its own queue. Publishing
/// copies the envelope into every subscription; one subscription's failure
/// to accept does not block or fail delivery to the others.
pub struct Topic {
    name: String,
    subscriptions: RwLock<Vec<(String, Arc<ChannelQueue>)>>,
    queue_config: QueueConfig,
    dead_letter: Arc<DeadLetterQueue>,
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic").field("name", &self.name).finish()
    }
}

impl Topic {
    pub fn new(name: impl Into<String>, queue_config: QueueConfig, dead_letter: Arc<DeadLetterQueue>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            subscriptions: RwLock::new(Vec::new()),
            queue_config,
            dead_letter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new independent subscription queue and returns it so the
    /// caller can attach a consumer.
    pub async fn subscribe(&self, subscription_id: impl Into<String>) -> Arc<ChannelQueue> {
        let subscription_id = subscription_id.into();
        let queue = ChannelQueue::new(
            format!("{}::{}", self.name, subscription_id),
            self.queue_config.clone(),
            Arc::clone(&self.dead_letter),
        );
        self.subscriptions
            .write()
            .await
            .push((subscription_id, Arc::clone(&queue)));
        queue
    }

    /// Removal is immediate: envelopes already accepted by the removed
    /// subscription's queue are still processed by it independently.
    pub async fn unsubscribe(&self, subscription_id: &str) {
        self.subscriptions.write().await.retain(|(id, _)| id != subscription_id);
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Copies the envelope into every subscription queue concurrently. A
    /// failure enqueuing into one subscription is logged and does not
    /// block or reduce delivery to the others.
    pub async fn publish(&self, envelope: Envelope) -> Result<usize, TransportError> {
        let subscriptions = self.subscriptions.read().await.clone();
        let topic_name = self.name.clone();

        let tasks: Vec<_> = subscriptions
            .into_iter()
            .map(|(subscription_id, queue)| {
                let envelope = envelope.clone();
                let topic_name = topic_name.clone();
                tokio::spawn(async move {
                    match queue.enqueue(envelope).await {
                        Ok(()) => true,
                        Err(error) => {
                            warn!(topic = %topic_name, subscription = %subscription_id, %error, "failed to enqueue into subscription");
                            false
                        }
                    }
                })
            })
            .collect();

        let mut delivered = 0;
        for task in tasks {
            if task.await.unwrap_or(false) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    pub async fn attach_consumer(&self, subscription_id: &str, consumer: Arc<Consumer>) {
        let subscriptions = self.subscriptions.read().await;
        if let Some((_, queue)) = subscriptions.iter().find(|(id, _)| id == subscription_id) {
            queue.attach_consumer(consumer).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_shared::config::RetryPolicyConfig;
    use switchboard_shared::{SystemTimeSource, TimeSource};
    use uuid::Uuid;

    fn envelope() -> Envelope {
        Envelope::new("Test", vec![], Uuid::now_v7(), SystemTimeSource.now())
    }

    #[tokio::test]
    async fn publish_delivers_to_every_subscription() {
        let topic = Topic::new("events", QueueConfig::default(), Arc::new(DeadLetterQueue::new()));
        topic.subscribe("a").await;
        topic.subscribe("b").await;
        topic.subscribe("c").await;

        let delivered = topic.publish(envelope()).await.unwrap();
        assert_eq!(delivered, 3);
    }

    #[tokio::test]
    async fn fan_out_with_one_failing_subscriber_does_not_block_others() {
        let topic = Topic::new("events", QueueConfig::default(), Arc::new(DeadLetterQueue::new()));
        let queue_a = topic.subscribe("a").await;
        let queue_b = topic.subscribe("b").await;
        let queue_c = topic.subscribe("c").await;

        let seen_a = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen_c = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let seen_a_clone = Arc::clone(&seen_a);
        let consumer_a = Consumer::new("a", 1, true, RetryPolicyConfig::default(), Arc::new(move |_e, _ctx| {
            let seen = Arc::clone(&seen_a_clone);
            Box::pin(async move {
                seen.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }));
        consumer_a.start();
        queue_a.attach_consumer(consumer_a).await;

        let failing_policy = RetryPolicyConfig {
            max_attempts: 1,
            ..Default::default()
        };
        let consumer_b = Consumer::new("b", 1, true, failing_policy, Arc::new(|_e, _ctx| {
            Box::pin(async { Err(switchboard_shared::SwitchboardError::TransientFailure { reason: "always fails".into() }) })
        }));
        consumer_b.start();
        queue_b.attach_consumer(consumer_b).await;

        let seen_c_clone = Arc::clone(&seen_c);
        let consumer_c = Consumer::new("c", 1, true, RetryPolicyConfig::default(), Arc::new(move |_e, _ctx| {
            let seen = Arc::clone(&seen_c_clone);
            Box::pin(async move {
                seen.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }));
        consumer_c.start();
        queue_c.attach_consumer(consumer_c).await;

        let delivered = topic.publish(envelope()).await.unwrap();
        assert_eq!(delivered, 3);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert!(seen_a.load(std::sync::atomic::Ordering::SeqCst));
        assert!(seen_c.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unsubscribe_removes_from_future_publishes() {
        let topic = Topic::new("events", QueueConfig::default(), Arc::new(DeadLetterQueue::new()));
        topic.subscribe("a").await;
        topic.unsubscribe("a").await;
        assert_eq!(topic.subscription_count().await, 0);
    }
}
