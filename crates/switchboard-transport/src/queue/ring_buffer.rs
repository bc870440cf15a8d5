use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use switchboard_shared::config::{ProducerMode, RingBufferConfig, WaitStrategy};
use switchboard_shared::SwitchboardError;

use crate::envelope::Envelope;

pub(crate) struct Slot<T> {
    value: UnsafeCell<Option<T>>,
    sequence: AtomicU64,
}

// SAFETY: access to `value` is gated by the producer/consumer sequence
// counters below, which guarantee at most one writer and one reader ever
// observe a given slot at a time.
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Slot<T> {
    fn new(sequence: u64) -> Self {
        Self {
            value: UnsafeCell::new(None),
            sequence: AtomicU64::new(sequence),
        }
    }
}

/// Single/multi-producer, single-consumer ring buffer over a power-of-two
/// number of preallocated slots, in the spirit of a single-writer LMAX
/// Disruptor. No heap allocation occurs on the enqueue hot path beyond the
/// envelope itself; the slot array is allocated once at construction.
pub struct RingBufferQueue {
    mask: u64,
    slots: Box<[Slot<Envelope>]>,
    producer_cursor: AtomicU64,
    consumer_cursor: AtomicU64,
    wait_strategy: WaitStrategy,
    producer_mode: ProducerMode,
    disposed: std::sync::atomic::AtomicBool,
    blocking_gate: (Mutex<()>, Condvar),
}

// SAFETY: RingBufferQueue only exposes `&self` methods, all synchronized
// through the atomic cursors and the slot-level sequence numbers.
unsafe impl Sync for RingBufferQueue {}
unsafe impl Send for RingBufferQueue {}

impl RingBufferQueue {
    pub fn new(config: RingBufferConfig) -> Result<Self, SwitchboardError> {
        config.validate()?;

        let size = config.buffer_size as u64;
        let slots = (0..size).map(Slot::new).collect::<Vec<_>>().into_boxed_slice();

        Ok(Self {
            mask: size - 1,
            slots,
            producer_cursor: AtomicU64::new(0),
            consumer_cursor: AtomicU64::new(0),
            wait_strategy: config.wait_strategy,
            producer_mode: config.producer_mode,
            disposed: std::sync::atomic::AtomicBool::new(false),
            blocking_gate: (Mutex::new(()), Condvar::new()),
        })
    }

    pub fn capacity(&self) -> u64 {
        self.mask + 1
    }

    fn index_of(&self, sequence: u64) -> usize {
        (sequence & self.mask) as usize
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let (_lock, condvar) = &self.blocking_gate;
        condvar.notify_all();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Enqueues one envelope. Returns `Ok(false)` rather than an error when
    /// the buffer is full and the wait strategy elects not to block
    /// (callers decide what "full" means for their strategy).
    pub fn try_enqueue(&self, envelope: Envelope) -> Result<bool, SwitchboardError> {
        if self.is_disposed() {
            return Ok(false);
        }

        let claimed = match self.producer_mode {
            ProducerMode::Single => {
                let current = self.producer_cursor.load(Ordering::Acquire);
                if current - self.consumer_cursor.load(Ordering::Acquire) >= self.capacity() {
                    return Ok(false);
                }
                self.producer_cursor.store(current + 1, Ordering::Release);
                current
            }
            ProducerMode::Multi => loop {
                let current = self.producer_cursor.load(Ordering::Acquire);
                if current - self.consumer_cursor.load(Ordering::Acquire) >= self.capacity() {
                    return Ok(false);
                }
                if self
                    .producer_cursor
                    .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    break current;
                }
            },
        };

        let slot = &self.slots[self.index_of(claimed)];
        // SAFETY: this producer uniquely claimed `claimed` via the cursor
        // arithmetic/CAS above; no other producer or the consumer writes
        // this slot until its sequence is published below.
        unsafe {
            *slot.value.get() = Some(envelope);
        }
        slot.sequence.store(claimed + 1, Ordering::Release);

        let (_lock, condvar) = &self.blocking_gate;
        condvar.notify_all();
        Ok(true)
    }

    /// Blocking/backoff dequeue honoring the configured wait strategy.
    /// Returns `None` only once the buffer has been disposed and drained.
    pub fn dequeue(&self) -> Option<Envelope> {
        loop {
            let consumer_seq = self.consumer_cursor.load(Ordering::Acquire);
            let slot = &self.slots[self.index_of(consumer_seq)];

            if slot.sequence.load(Ordering::Acquire) == consumer_seq + 1 {
                // SAFETY: the producer published this slot (sequence ==
                // consumer_seq + 1) before the consumer ever observes it,
                // and only one consumer exists, so this read is exclusive.
                let value = unsafe { (*slot.value.get()).take() };
                self.consumer_cursor.store(consumer_seq + 1, Ordering::Release);
                return value;
            }

            if self.is_disposed() {
                return None;
            }

            match self.wait_strategy {
                WaitStrategy::BusySpin => std::hint::spin_loop(),
                WaitStrategy::Yielding => std::thread::yield_now(),
                WaitStrategy::Sleeping => std::thread::sleep(std::time::Duration::from_micros(50)),
                WaitStrategy::Blocking => {
                    let (lock, condvar) = &self.blocking_gate;
                    let guard = lock.lock().expect("ring buffer mutex poisoned");
                    let _ = condvar
                        .wait_timeout(guard, std::time::Duration::from_millis(10))
                        .expect("ring buffer mutex poisoned");
                }
                WaitStrategy::TimeoutBlocking => {
                    let (lock, condvar) = &self.blocking_gate;
                    let guard = lock.lock().expect("ring buffer mutex poisoned");
                    let _ = condvar
                        .wait_timeout(guard, std::time::Duration::from_millis(50))
                        .expect("ring buffer mutex poisoned");
                }
            }
        }
    }

    /// Non-blocking dequeue: returns `None` immediately if no slot is ready
    /// rather than waiting per the configured strategy.
    pub fn try_dequeue_once(&self) -> Option<Envelope> {
        let consumer_seq = self.consumer_cursor.load(Ordering::Acquire);
        let slot = &self.slots[self.index_of(consumer_seq)];
        if slot.sequence.load(Ordering::Acquire) != consumer_seq + 1 {
            return None;
        }
        // SAFETY: see `dequeue` — single consumer, slot published by producer.
        let value = unsafe { (*slot.value.get()).take() };
        self.consumer_cursor.store(consumer_seq + 1, Ordering::Release);
        value
    }

    pub fn producer_cursor(&self) -> u64 {
        self.producer_cursor.load(Ordering::Acquire)
    }

    pub fn consumer_cursor(&self) -> u64 {
        self.consumer_cursor.load(Ordering::Acquire)
    }
}
