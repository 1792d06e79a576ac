//! Time sources for the coordination store.
//!
//! Scripts never read the wall clock themselves: the store hands them `now`
//! so that every decision inside one atomic unit sees the same instant, and so
//! tests can move time forward deterministically.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Milliseconds since the Unix epoch. All store scores use this unit.
pub type Millis = i64;

/// Score of a holder that never expires.
pub const NO_EXPIRY: Millis = Millis::MAX;

/// A source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> Millis;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_ms(by), Ordering::SeqCst);
    }

    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a duration to whole milliseconds, saturating.
pub fn duration_ms(duration: Duration) -> Millis {
    Millis::try_from(duration.as_millis()).unwrap_or(Millis::MAX)
}

/// Expiry score for a holder acquired at `now` with an optional TTL.
pub fn expiry_score(now: Millis, ttl: Option<Duration>) -> Millis {
    match ttl {
        Some(ttl) => now.saturating_add(duration_ms(ttl)),
        None => NO_EXPIRY,
    }
}

/// Render an epoch-millisecond score as RFC3339, or `never` for [`NO_EXPIRY`].
pub fn format_millis(ms: Millis) -> String {
    if ms == NO_EXPIRY {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();

        clock.advance(Duration::from_secs(61));
        assert_eq!(other.now_ms(), 62_000);

        other.set(5);
        assert_eq!(clock.now_ms(), 5);
    }

    #[test]
    fn expiry_score_without_ttl_never_expires() {
        assert_eq!(expiry_score(10, None), NO_EXPIRY);
        assert_eq!(expiry_score(10, Some(Duration::from_secs(60))), 60_010);
        assert_eq!(
            expiry_score(Millis::MAX - 1, Some(Duration::from_secs(1))),
            Millis::MAX
        );
    }

    #[test]
    fn format_millis_handles_sentinel() {
        assert_eq!(format_millis(NO_EXPIRY), "never");
        assert!(format_millis(0).starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn system_clock_is_recent() {
        let now = SystemClock.now_ms();
        assert!((Utc::now().timestamp_millis() - now).abs() < 5_000);
    }
}
