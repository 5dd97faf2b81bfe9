//! Injectable wall-clock abstraction.
//!
//! Components that make time-based decisions (key rotation schedules,
//! eligibility windows, token temporal claims) take an `Arc<dyn Clock>`
//! instead of calling `Utc::now()` directly, so tests can drive time
//! deterministically.
//!
//! Production code uses [`SystemClock`]. Tests enable the `test-utils`
//! feature and use [`ManualClock`] to set or advance time explicitly.

use chrono::{DateTime, Utc};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Interior mutability lets a test hold an `Arc<ManualClock>`, hand a clone
/// to the component under test, and move time forward between assertions.
#[cfg(any(test, feature = "test-utils"))]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Create a clock frozen at the given instant.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = *now + delta;
    }

    /// Jump to an absolute instant (may move backward).
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = instant;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
