//! Clock abstraction for operation timestamps
//!
//! Every `OperationRecord` takes its timestamp from the session clock, so
//! history ordering can be driven deterministically in tests.
//!
//! Implementations:
//! - `SystemClock`: wall-clock UTC time
//! - `ManualClock`: time only moves when told to via `advance()` or `set()`

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of operation timestamps
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Real UTC time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock, shared between clones
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Current virtual time in microseconds since the epoch
    time_us: Arc<AtomicI64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            time_us: Arc::new(AtomicI64::new(start.timestamp_micros())),
        }
    }

    /// Clock starting at the given epoch milliseconds
    pub fn from_millis(start_ms: i64) -> Self {
        ManualClock {
            time_us: Arc::new(AtomicI64::new(start_ms.saturating_mul(1000))),
        }
    }

    pub fn advance(&self, by: Duration) {
        let micros = by.num_microseconds().unwrap_or(i64::MAX);
        self.time_us.fetch_add(micros, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.time_us.store(to.timestamp_micros(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.time_us.load(Ordering::SeqCst);
        Utc.timestamp_micros(micros)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
