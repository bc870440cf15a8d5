//! End-to-end latency benchmarks covering the two hottest paths: a command
//! round-tripping through the full seven-decorator pipeline, and an
//! envelope round-tripping through the channel-backed and ring-buffer
//! queue implementations.
//!
//! Run with `cargo bench --bench e2e_latency --features benchmarks`.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use switchboard_mediator::handlers::CommandHandlerWithResponse;
use switchboard_mediator::MediatorConfig;
use switchboard_shared::config::{ProducerMode, QueueConfig, RingBufferConfig, WaitStrategy};
use switchboard_shared::{Command, Message, MessageEnvelope, MessageId, Metadata, ProcessingContext, SwitchboardError, SystemTimeSource, TimeSource};
use switchboard_transport::queue::RingBufferQueue;
use switchboard_transport::{Envelope, InMemoryTransport, MessageContext, Transport, TransportAddress};

#[derive(Debug, Clone)]
struct Ping(MessageEnvelope);

impl Message for Ping {
    fn message_id(&self) -> MessageId {
        self.0.message_id()
    }
    fn timestamp(&self) -> switchboard_shared::Timestamp {
        self.0.timestamp()
    }
    fn correlation_id(&self) -> Option<&str> {
        self.0.correlation_id()
    }
    fn causation_id(&self) -> Option<MessageId> {
        self.0.causation_id()
    }
    fn metadata(&self) -> Option<&Metadata> {
        self.0.metadata()
    }
}
impl Command for Ping {}

struct PingHandler;

#[async_trait]
impl CommandHandlerWithResponse<Ping, u32> for PingHandler {
    async fn handle(&self, _cmd: Ping, _ctx: &mut ProcessingContext, _cancel: CancellationToken) -> Result<u32, SwitchboardError> {
        Ok(1)
    }
}

fn bench_pipeline_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mediator = MediatorConfig::builder().build().assemble();
    mediator.commands.register_with_response(Arc::new(PingHandler)).unwrap();

    c.bench_function("command_through_full_decorator_chain", |b| {
        b.to_async(&rt).iter_batched(
            || Ping(MessageEnvelope::new(Uuid::now_v7(), SystemTimeSource.now())),
            |ping| {
                let commands = &mediator.commands;
                async move {
                    let _: u32 = commands.send_with_response(ping, CancellationToken::new()).await.unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_channel_queue_send(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let transport = InMemoryTransport::new(QueueConfig::default(), Arc::new(SystemTimeSource));
    rt.block_on(transport.connect()).unwrap();

    let handler: switchboard_transport::HandlerFn = Arc::new(|_envelope, _ctx: Arc<MessageContext>| Box::pin(async { Ok(()) }));
    rt.block_on(transport.subscribe(&TransportAddress::Queue("bench".into()), "bench-consumer", handler)).unwrap();

    c.bench_function("channel_queue_send", |b| {
        b.to_async(&rt).iter_batched(
            || Envelope::new("Ping", vec![], Uuid::now_v7(), SystemTimeSource.now()),
            |envelope| {
                let transport = &transport;
                async move {
                    transport.send(&TransportAddress::Queue("bench".into()), envelope).await.unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_ring_buffer_enqueue_dequeue(c: &mut Criterion) {
    let ring = RingBufferQueue::new(RingBufferConfig {
        buffer_size: 1024,
        wait_strategy: WaitStrategy::BusySpin,
        producer_mode: ProducerMode::Single,
    })
    .unwrap();

    c.bench_function("ring_buffer_enqueue_dequeue", |b| {
        b.iter_batched(
            || Envelope::new("Tick", vec![], Uuid::now_v7(), SystemTimeSource.now()),
            |envelope| {
                ring.try_enqueue(envelope).unwrap();
                ring.dequeue().unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_pipeline_round_trip, bench_channel_queue_send, bench_ring_buffer_enqueue_dequeue);
criterion_main!(benches);
