//! Injected time source.
//!
//! Business logic never calls `Utc::now()` directly; it asks a
//! `TimeSource` for the current instant so tests can hold time fixed or
//! advance it deterministically (idempotency TTL expiry, saga timers).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time, used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually-advanceable clock for deterministic tests of TTL expiry and
/// saga timer re-arming. Only compiled for this crate's own tests or for
/// downstream crates that opt into the `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct TestTimeSource {
    millis_since_epoch: AtomicI64,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestTimeSource {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            millis_since_epoch: AtomicI64::new(start.timestamp_millis()),
        })
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.millis_since_epoch
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TimeSource for TestTimeSource {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis_since_epoch.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis).single().expect("valid timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_time_source_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = TestTimeSource::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));
    }

    #[test]
    fn system_time_source_moves_forward() {
        let clock = SystemTimeSource;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
