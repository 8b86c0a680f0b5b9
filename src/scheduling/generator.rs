//! Deterministic slot generation from a faculty-supplied time range.
//!
//! The generator is pure: given the same plan it always yields the same
//! candidate intervals. Overlap with existing slots is handled by silently
//! skipping the colliding candidate, so a bulk request can partially succeed;
//! persistence of the survivors is atomic and lives in the repository layer.

use time::{Duration, OffsetDateTime};

use super::clock::Clock;
use super::error::{SchedulingError, SchedulingResult};

pub const ALLOWED_SLOT_DURATIONS: [i64; 3] = [5, 10, 15];
pub const ALLOWED_BREAK_DURATIONS: [i64; 4] = [0, 5, 10, 15];

/// A faculty's request to carve a time range into bookable slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    pub slot_duration_minutes: i64,
    pub break_duration_minutes: i64,
}

/// One candidate interval emitted by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInterval {
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
}

impl SlotPlan {
    /// Reject logically inconsistent plans before any write happens.
    pub fn validate(&self, clock: &dyn Clock) -> SchedulingResult<()> {
        if !ALLOWED_SLOT_DURATIONS.contains(&self.slot_duration_minutes) {
            return Err(SchedulingError::validation(
                "Slot duration must be 5, 10 or 15 minutes",
            ));
        }
        if !ALLOWED_BREAK_DURATIONS.contains(&self.break_duration_minutes) {
            return Err(SchedulingError::validation(
                "Break duration must be 0, 5, 10 or 15 minutes",
            ));
        }
        if self.end_time <= self.start_time {
            return Err(SchedulingError::validation(
                "End time must be after start time",
            ));
        }
        if self.start_time <= clock.now() {
            return Err(SchedulingError::validation(
                "Start time must be in the future",
            ));
        }
        if self.candidates().next().is_none() {
            return Err(SchedulingError::validation(format!(
                "Time range is too short for a {}-minute slot",
                self.slot_duration_minutes
            )));
        }
        Ok(())
    }

    /// Candidate intervals, in order. Restartable: each call starts over from
    /// the plan's start time.
    pub fn candidates(&self) -> Candidates {
        Candidates {
            cursor: self.start_time,
            end_time: self.end_time,
            slot: Duration::minutes(self.slot_duration_minutes),
            step: Duration::minutes(self.slot_duration_minutes + self.break_duration_minutes),
        }
    }
}

/// Lazy, finite iterator over a plan's candidate intervals.
pub struct Candidates {
    cursor: OffsetDateTime,
    end_time: OffsetDateTime,
    slot: Duration,
    step: Duration,
}

impl Iterator for Candidates {
    type Item = SlotInterval;

    fn next(&mut self) -> Option<SlotInterval> {
        let end = self.cursor + self.slot;
        if end > self.end_time {
            return None;
        }
        let interval = SlotInterval {
            start_time: self.cursor,
            end_time: end,
        };
        self.cursor += self.step;
        Some(interval)
    }
}

/// Half-open interval overlap: [a_start, a_end) intersects [b_start, b_end).
pub fn intervals_overlap(
    a_start: OffsetDateTime,
    a_end: OffsetDateTime,
    b_start: OffsetDateTime,
    b_end: OffsetDateTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Drop candidates that collide with any existing interval of the same
/// faculty. Colliding candidates are skipped, not errors: bulk creation
/// reports the count actually persisted, not the count requested.
pub fn filter_overlapping(
    candidates: impl Iterator<Item = SlotInterval>,
    existing: &[SlotInterval],
) -> Vec<SlotInterval> {
    candidates
        .filter(|c| {
            !existing
                .iter()
                .any(|e| intervals_overlap(c.start_time, c.end_time, e.start_time, e.end_time))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::clock::FixedClock;
    use time::macros::datetime;

    fn plan(
        start: OffsetDateTime,
        end: OffsetDateTime,
        slot_minutes: i64,
        break_minutes: i64,
    ) -> SlotPlan {
        SlotPlan {
            start_time: start,
            end_time: end,
            slot_duration_minutes: slot_minutes,
            break_duration_minutes: break_minutes,
        }
    }

    #[test]
    fn one_hour_range_with_breaks_yields_three_slots() {
        // 09:00-10:00, 15-minute slots, 5-minute breaks.
        let p = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 10:00 UTC),
            15,
            5,
        );
        let slots: Vec<_> = p.candidates().collect();

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start_time, datetime!(2026-03-10 09:00 UTC));
        assert_eq!(slots[0].end_time, datetime!(2026-03-10 09:15 UTC));
        assert_eq!(slots[1].start_time, datetime!(2026-03-10 09:20 UTC));
        assert_eq!(slots[1].end_time, datetime!(2026-03-10 09:35 UTC));
        assert_eq!(slots[2].start_time, datetime!(2026-03-10 09:40 UTC));
        assert_eq!(slots[2].end_time, datetime!(2026-03-10 09:55 UTC));
    }

    #[test]
    fn generation_is_deterministic_and_restartable() {
        let p = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 11:30 UTC),
            10,
            5,
        );
        let first: Vec<_> = p.candidates().collect();
        let second: Vec<_> = p.candidates().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn back_to_back_slots_without_breaks() {
        let p = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 09:30 UTC),
            10,
            0,
        );
        let slots: Vec<_> = p.candidates().collect();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2].end_time, datetime!(2026-03-10 09:30 UTC));
    }

    #[test]
    fn validation_rejects_inverted_range() {
        let clock = FixedClock(datetime!(2026-03-01 08:00 UTC));
        let p = plan(
            datetime!(2026-03-10 10:00 UTC),
            datetime!(2026-03-10 09:00 UTC),
            15,
            5,
        );
        let err = p.validate(&clock).unwrap_err();
        assert!(err.to_string().contains("End time must be after start time"));
    }

    #[test]
    fn validation_rejects_past_start() {
        let clock = FixedClock(datetime!(2026-03-10 09:30 UTC));
        let p = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 10:00 UTC),
            15,
            5,
        );
        let err = p.validate(&clock).unwrap_err();
        assert!(err.to_string().contains("Start time must be in the future"));
    }

    #[test]
    fn validation_rejects_range_too_short() {
        let clock = FixedClock(datetime!(2026-03-01 08:00 UTC));
        let p = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 09:10 UTC),
            15,
            5,
        );
        let err = p.validate(&clock).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn validation_rejects_unsupported_durations() {
        let clock = FixedClock(datetime!(2026-03-01 08:00 UTC));
        let bad_slot = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 10:00 UTC),
            20,
            5,
        );
        assert!(bad_slot.validate(&clock).is_err());

        let bad_break = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 10:00 UTC),
            15,
            7,
        );
        assert!(bad_break.validate(&clock).is_err());
    }

    #[test]
    fn overlapping_candidates_are_silently_skipped() {
        let p = plan(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 10:00 UTC),
            15,
            5,
        );
        // An existing slot sits on top of the second candidate (09:20-09:35).
        let existing = vec![SlotInterval {
            start_time: datetime!(2026-03-10 09:30 UTC),
            end_time: datetime!(2026-03-10 09:45 UTC),
        }];

        let surviving = filter_overlapping(p.candidates(), &existing);
        assert_eq!(surviving.len(), 2);
        assert_eq!(surviving[0].start_time, datetime!(2026-03-10 09:00 UTC));
        assert_eq!(surviving[1].start_time, datetime!(2026-03-10 09:40 UTC));
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 09:15 UTC),
            datetime!(2026-03-10 09:15 UTC),
            datetime!(2026-03-10 09:30 UTC),
        ));
        assert!(intervals_overlap(
            datetime!(2026-03-10 09:00 UTC),
            datetime!(2026-03-10 09:16 UTC),
            datetime!(2026-03-10 09:15 UTC),
            datetime!(2026-03-10 09:30 UTC),
        ));
    }
}
