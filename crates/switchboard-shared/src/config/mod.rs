//! Typed configuration structs, loadable from TOML via the `config` crate,
//! following the teacher's pattern of serde-derived structs with
//! `#[serde(default)]` fields and a hand-written `Default` impl.

mod retry;
mod ring_buffer;

pub use retry::{BackoffType, RetryPolicyConfig};
pub use ring_buffer::{ProducerMode, WaitStrategy};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SwitchboardError;

/// Overflow behaviour when a channel-backed queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    Block,
    DropOldest,
    DropNewest,
    Fail,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::Block
    }
}

/// Configuration for a channel-backed queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_queue_length: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_length: 1024,
            overflow_policy: OverflowPolicy::Block,
        }
    }
}

/// Configuration for the ring-buffer queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfig {
    pub buffer_size: usize,
    pub wait_strategy: WaitStrategy,
    pub producer_mode: ProducerMode,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            wait_strategy: WaitStrategy::Blocking,
            producer_mode: ProducerMode::Single,
        }
    }
}

impl RingBufferConfig {
    pub fn validate(&self) -> Result<(), SwitchboardError> {
        if self.buffer_size == 0 || !self.buffer_size.is_power_of_two() {
            return Err(SwitchboardError::InvalidConfiguration {
                reason: format!(
                    "ring buffer size must be a power of two, got {}",
                    self.buffer_size
                ),
            });
        }
        Ok(())
    }
}

/// Per-consumer delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub concurrent_message_limit: usize,
    pub auto_acknowledge: bool,
    pub retry_policy: RetryPolicyConfig,
    pub start_immediately: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            concurrent_message_limit: 1,
            auto_acknowledge: true,
            retry_policy: RetryPolicyConfig::default(),
            start_immediately: true,
        }
    }
}

/// Idempotency policy knobs. `success_ttl`/`failure_ttl` are stored as
/// durations rather than `chrono::Duration` so they serialize cleanly from
/// TOML (`config` maps duration-like strings via `humantime-serde` in the
/// teacher; here plain seconds keep the surface small).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    pub success_ttl: Duration,
    pub failure_ttl: Duration,
    pub cache_failures: bool,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            success_ttl: Duration::from_secs(24 * 60 * 60),
            failure_ttl: Duration::from_secs(60 * 60),
            cache_failures: true,
        }
    }
}

impl IdempotencyConfig {
    pub fn validate(&self) -> Result<(), SwitchboardError> {
        if self.success_ttl.is_zero() || self.failure_ttl.is_zero() {
            return Err(SwitchboardError::InvalidConfiguration {
                reason: "idempotency TTLs must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn success_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.success_ttl).unwrap_or_default()
    }

    pub fn failure_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.failure_ttl).unwrap_or_default()
    }
}
