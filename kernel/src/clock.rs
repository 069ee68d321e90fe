// Time Source
//
// Every timestamp the manager records comes from a `Clock`, so
// simulations and tests can move time forward explicitly.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock with millisecond resolution.
///
/// Share it through an `Arc` so the test or driver can advance
/// time while the manager reads it.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Move time forward, pinned to the representable calendar range.
    pub fn advance(&self, by: Duration) {
        let min = DateTime::<Utc>::MIN_UTC.timestamp_millis();
        let max = DateTime::<Utc>::MAX_UTC.timestamp_millis();
        let step = by.num_milliseconds();

        let _ = self
            .millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |ms| {
                Some(ms.saturating_add(step).clamp(min, max))
            });
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = ManualClock::starting_at(start);

        clock.advance(Duration::minutes(70));
        assert_eq!(clock.now() - start, Duration::minutes(70));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn manual_clock_stops_at_the_end_of_the_calendar() {
        let end = DateTime::<Utc>::MAX_UTC;
        let clock = ManualClock::starting_at(end - Duration::days(1));

        clock.advance(Duration::days(2));
        assert_eq!(clock.now().timestamp_millis(), end.timestamp_millis());

        clock.advance(Duration::MAX);
        assert_eq!(clock.now().timestamp_millis(), end.timestamp_millis());
    }
}
