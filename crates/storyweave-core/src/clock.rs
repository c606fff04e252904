//! Clock abstraction for deterministic timers.

use chrono::{DateTime, Utc};

/// Abstraction over system time.
///
/// Every timestamp and timer deadline in the coordination layer is read
/// through this trait so debounce windows and hash expiry can be driven by a
/// manual clock in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
