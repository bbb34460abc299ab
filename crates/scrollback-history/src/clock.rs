//! Injectable time source
//!
//! Retention decisions compare line timestamps against "now". The store
//! takes its notion of now from a [`Clock`] so that age-based expiry can be
//! exercised in tests without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually advanced clock for tests and simulations.
///
/// Second-granular, which is all retention needs.
#[derive(Debug)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given epoch second.
    pub fn at(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute epoch second.
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// The current epoch second.
    pub fn secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.secs.load(Ordering::SeqCst), 0)
            .expect("manual clock second out of chrono range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at(1_000_000);
        assert_eq!(clock.now().timestamp(), 1_000_000);

        clock.advance(4000);
        assert_eq!(clock.now().timestamp(), 1_004_000);

        clock.set(500);
        assert_eq!(clock.secs(), 500);
    }

    #[test]
    fn test_system_clock_is_sane() {
        // Sometime after 2020-01-01.
        assert!(SystemClock.now().timestamp() > 1_577_836_800);
    }
}
