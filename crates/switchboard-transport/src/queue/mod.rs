//! Two interchangeable queue implementations satisfying the same
//! dispatch contract: a default channel-backed FIFO and a high-throughput
//! lock-free ring buffer.

mod channel;
mod ring_buffer;

pub use channel::ChannelQueue;
pub use ring_buffer::RingBufferQueue;
