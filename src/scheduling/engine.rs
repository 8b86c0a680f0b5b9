//! Booking state machine and concurrency-safe reservation logic.
//!
//! `create_booking` is the only operation that needs serialization: the slot
//! row is locked for the duration of the check-then-insert, and a partial
//! unique index on (slot_id) WHERE status = 'confirmed' backstops any path
//! that races past the lock. Which of two racing students wins is
//! store-dependent and deliberately unspecified; the loser always observes
//! `SlotAlreadyBooked`, never an overwritten booking.

use std::time::Duration as StdDuration;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{Booking, BookingStatus};
use crate::db::repositories::{BookingRepository, SlotRepository, UserRepository};
use crate::scheduling::clock::{self, Clock, SharedClock};
use crate::scheduling::error::{SchedulingError, SchedulingResult};
use crate::scheduling::subjects::normalize_subject;

/// Bounded retry for transient store conflicts. Engine errors themselves are
/// terminal to the request.
const MAX_CLAIM_ATTEMPTS: u32 = 3;
const CLAIM_BACKOFF_MS: u64 = 50;

pub const MAX_CANCELLATION_REASON_LEN: usize = 500;

/// Who is asking for a state transition. Students are bound by the
/// cancellation window and may only touch their own bookings; faculty may
/// only touch bookings on their own slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Student(Uuid),
    Faculty(Uuid),
}

#[derive(Debug, Clone, Copy)]
pub struct BookingPolicy {
    pub cancellation_window_hours: i64,
}

#[derive(Clone)]
pub struct BookingEngine {
    pool: PgPool,
    clock: SharedClock,
    policy: BookingPolicy,
}

impl BookingEngine {
    pub fn new(pool: PgPool, clock: SharedClock, policy: BookingPolicy) -> Self {
        Self {
            pool,
            clock,
            policy,
        }
    }

    /// Atomically claim a slot for a student. At most one caller wins a
    /// given slot; losers observe `SlotAlreadyBooked`.
    pub async fn create_booking(
        &self,
        student_id: Uuid,
        slot_id: Uuid,
        group_id: &str,
    ) -> SchedulingResult<Booking> {
        if group_id.trim().is_empty() {
            return Err(SchedulingError::validation("group_id is required"));
        }

        let mut attempt = 1;
        loop {
            match self.try_create(student_id, slot_id, group_id).await {
                Ok(booking) => {
                    info!(
                        booking_id = %booking.id,
                        slot_id = %slot_id,
                        student_id = %student_id,
                        "booking confirmed"
                    );
                    return Ok(booking);
                }
                Err(SchedulingError::Database(err)) if is_unique_violation(&err) => {
                    // Lost the race on the confirmed-per-slot index.
                    return Err(SchedulingError::SlotAlreadyBooked);
                }
                Err(SchedulingError::Database(err))
                    if is_transient_conflict(&err) && attempt < MAX_CLAIM_ATTEMPTS =>
                {
                    warn!(
                        slot_id = %slot_id,
                        attempt,
                        error = %err,
                        "transient conflict while claiming slot, retrying"
                    );
                    tokio::time::sleep(StdDuration::from_millis(
                        CLAIM_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                Err(SchedulingError::Database(err)) if is_transient_conflict(&err) => {
                    return Err(SchedulingError::SlotAlreadyBooked);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_create(
        &self,
        student_id: Uuid,
        slot_id: Uuid,
        group_id: &str,
    ) -> SchedulingResult<Booking> {
        let mut tx = self.pool.begin().await?;

        // Lock the slot row against concurrent claims.
        let slot = SlotRepository::find_for_update(&mut tx, slot_id)
            .await?
            .ok_or(SchedulingError::SlotNotFound)?;

        if clock::is_past(self.clock.as_ref(), slot.start_time) {
            return Err(SchedulingError::validation("Cannot book a slot in the past"));
        }

        if !UserRepository::availability_in_tx(&mut tx, slot.faculty_id).await? {
            return Err(SchedulingError::FacultyUnavailable);
        }

        if BookingRepository::confirmed_exists_for_slot(&mut tx, slot_id).await? {
            return Err(SchedulingError::SlotAlreadyBooked);
        }

        let subject = normalize_subject(&slot.subject);

        if BookingRepository::confirmed_exists_for_subject(&mut tx, student_id, &subject).await? {
            return Err(SchedulingError::DuplicateActiveBooking(subject));
        }

        // The most recent absent booking for the subject decides the block.
        if let Some(absent) =
            BookingRepository::latest_absent_for_subject(&mut tx, student_id, &subject).await?
        {
            if !absent.rebooking_allowed {
                return Err(SchedulingError::SubjectBlocked(subject));
            }
        }

        let booking = BookingRepository::insert(&mut tx, slot_id, student_id, group_id).await?;
        tx.commit().await?;
        Ok(booking)
    }

    /// Cancel a confirmed booking. Students are held to the cancellation
    /// window; faculty may cancel any confirmed booking on their own slots.
    pub async fn cancel_booking(
        &self,
        actor: Actor,
        booking_id: Uuid,
        reason: &str,
    ) -> SchedulingResult<Booking> {
        if reason.len() > MAX_CANCELLATION_REASON_LEN {
            return Err(SchedulingError::validation("Reason too long"));
        }

        let mut tx = self.pool.begin().await?;

        let booking = BookingRepository::find_for_update(&mut tx, booking_id)
            .await?
            .ok_or(SchedulingError::BookingNotFound)?;
        let slot = SlotRepository::find_for_update(&mut tx, booking.slot_id)
            .await?
            .ok_or(SchedulingError::BookingNotFound)?;

        match actor {
            // A student cannot see (or cancel) someone else's booking.
            Actor::Student(id) if booking.student_id != id => {
                return Err(SchedulingError::BookingNotFound);
            }
            Actor::Faculty(id) if slot.faculty_id != id => {
                return Err(SchedulingError::NotSlotOwner);
            }
            _ => {}
        }

        if booking.status != BookingStatus::Confirmed {
            return Err(SchedulingError::NotConfirmed {
                action: "cancelled",
            });
        }

        if let Actor::Student(_) = actor {
            if clock::within_cancellation_window(
                self.clock.as_ref(),
                slot.start_time,
                self.policy.cancellation_window_hours,
            ) {
                return Err(SchedulingError::WithinCancellationWindow {
                    hours: self.policy.cancellation_window_hours,
                });
            }
        }

        let now = self.clock.now();
        let cancelled = BookingRepository::mark_cancelled(&mut tx, booking_id, reason, now).await?;
        tx.commit().await?;

        info!(booking_id = %booking_id, ?actor, "booking cancelled");
        Ok(cancelled)
    }

    /// Mark a confirmed booking as completed (evaluated). No time
    /// constraint: faculty decide when the evaluation happened.
    pub async fn complete_booking(
        &self,
        faculty_id: Uuid,
        booking_id: Uuid,
    ) -> SchedulingResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let booking = self
            .locked_booking_owned_by(&mut tx, faculty_id, booking_id)
            .await?;

        if booking.status != BookingStatus::Confirmed {
            return Err(SchedulingError::NotConfirmed {
                action: "marked as completed",
            });
        }

        let completed = BookingRepository::mark_completed(&mut tx, booking_id).await?;
        tx.commit().await?;

        info!(booking_id = %booking_id, "booking completed");
        Ok(completed)
    }

    /// Mark a confirmed booking as absent. Blocks the student from booking
    /// the subject again until `allow_rebooking` lifts the block.
    pub async fn mark_absent(
        &self,
        faculty_id: Uuid,
        booking_id: Uuid,
    ) -> SchedulingResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let booking = self
            .locked_booking_owned_by(&mut tx, faculty_id, booking_id)
            .await?;

        if booking.status != BookingStatus::Confirmed {
            return Err(SchedulingError::NotConfirmed {
                action: "marked absent",
            });
        }

        let now = self.clock.now();
        let absent = BookingRepository::mark_absent(&mut tx, booking_id, now).await?;
        tx.commit().await?;

        info!(booking_id = %booking_id, student_id = %absent.student_id, "student marked absent");
        Ok(absent)
    }

    /// Lift the absence block on one specific absent booking. Does not
    /// create a new booking; it only removes the precondition that blocks
    /// `create_booking` for the subject.
    pub async fn allow_rebooking(
        &self,
        faculty_id: Uuid,
        booking_id: Uuid,
    ) -> SchedulingResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let booking = self
            .locked_booking_owned_by(&mut tx, faculty_id, booking_id)
            .await?;

        if booking.status != BookingStatus::Absent {
            return Err(SchedulingError::NotAbsent);
        }

        let unlocked = BookingRepository::allow_rebooking(&mut tx, booking_id).await?;
        tx.commit().await?;

        info!(booking_id = %booking_id, student_id = %unlocked.student_id, "rebooking allowed");
        Ok(unlocked)
    }

    async fn locked_booking_owned_by(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        faculty_id: Uuid,
        booking_id: Uuid,
    ) -> SchedulingResult<Booking> {
        let booking = BookingRepository::find_for_update(tx, booking_id)
            .await?
            .ok_or(SchedulingError::BookingNotFound)?;
        let slot = SlotRepository::find_for_update(tx, booking.slot_id)
            .await?
            .ok_or(SchedulingError::BookingNotFound)?;
        if slot.faculty_id != faculty_id {
            return Err(SchedulingError::NotSlotOwner);
        }
        Ok(booking)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| is_unique_violation_code(&code))
        .unwrap_or(false)
}

fn is_transient_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| is_transient_conflict_code(&code))
        .unwrap_or(false)
}

fn is_unique_violation_code(code: &str) -> bool {
    code == "23505"
}

/// Serialization failures, deadlocks and lock timeouts are worth one more
/// try; everything else is surfaced as-is.
fn is_transient_conflict_code(code: &str) -> bool {
    matches!(code, "40001" | "40P01" | "55P03")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_code_is_recognised() {
        assert!(is_unique_violation_code("23505"));
        assert!(!is_unique_violation_code("23503"));
    }

    #[test]
    fn transient_codes_are_retryable() {
        assert!(is_transient_conflict_code("40001"));
        assert!(is_transient_conflict_code("40P01"));
        assert!(is_transient_conflict_code("55P03"));
        assert!(!is_transient_conflict_code("23505"));
        assert!(!is_transient_conflict_code("42601"));
    }
}
