use std::sync::Arc;

use time::{Duration, OffsetDateTime};

/// Single source of "now" for every time-gated decision in the scheduling
/// core. Handlers and repositories never read the wall clock directly, so
/// tests can inject a fixed instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub type SharedClock = Arc<dyn Clock>;

/// Production clock reading UTC wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Test clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// True when `t` is at or before the current instant.
pub fn is_past(clock: &dyn Clock, t: OffsetDateTime) -> bool {
    t <= clock.now()
}

/// True when `start_time` is less than `window_hours` away. Students may not
/// self-cancel inside this window; faculty are exempt.
pub fn within_cancellation_window(
    clock: &dyn Clock,
    start_time: OffsetDateTime,
    window_hours: i64,
) -> bool {
    start_time - clock.now() < Duration::hours(window_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn is_past_includes_the_current_instant() {
        let clock = FixedClock(datetime!(2026-03-10 12:00 UTC));
        assert!(is_past(&clock, datetime!(2026-03-10 12:00 UTC)));
        assert!(is_past(&clock, datetime!(2026-03-10 11:59 UTC)));
        assert!(!is_past(&clock, datetime!(2026-03-10 12:00:01 UTC)));
    }

    #[test]
    fn cancellation_window_boundaries() {
        let clock = FixedClock(datetime!(2026-03-10 12:00 UTC));

        // Starts in 23h with a 24h window: inside the window.
        assert!(within_cancellation_window(
            &clock,
            datetime!(2026-03-11 11:00 UTC),
            24
        ));
        // Starts in 25h: outside the window.
        assert!(!within_cancellation_window(
            &clock,
            datetime!(2026-03-11 13:00 UTC),
            24
        ));
        // Exactly 24h away is not "within" the window.
        assert!(!within_cancellation_window(
            &clock,
            datetime!(2026-03-11 12:00 UTC),
            24
        ));
    }
}
