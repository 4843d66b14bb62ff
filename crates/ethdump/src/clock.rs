//! Time sources for timestamps and liveness timeouts.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds per millisecond.
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Wall-clock nanoseconds since the Unix epoch.
pub trait Clock {
    /// Current time.
    fn now_nanos(&self) -> u64;
}

/// The realtime clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() * NANOS_PER_SEC + u64::from(d.subsec_nanos()))
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to. Clones share one time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Clock reading `nanos`.
    pub fn new(nanos: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(nanos)),
        }
    }

    /// Move forward by `nanos`.
    pub fn advance(&self, nanos: u64) {
        self.now.set(self.now.get() + nanos);
    }

    /// Move forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(ms * NANOS_PER_MILLI);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.now.get()
    }
}

/// Split nanoseconds into pcap's 32-bit seconds and nanoseconds.
#[allow(clippy::cast_possible_truncation)]
pub const fn pcap_timestamp(nanos: u64) -> (u32, u32) {
    ((nanos / NANOS_PER_SEC) as u32, (nanos % NANOS_PER_SEC) as u32)
}
