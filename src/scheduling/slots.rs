//! Slot creation, generation and deletion on behalf of faculty.
//!
//! Single creates reject overlap outright; bulk creates skip overlapping
//! candidates and persist the survivors atomically. A slot's subject is
//! never client-supplied: it is resolved from the faculty's assignment
//! mapping, which must pin the faculty to exactly one allowed subject.

use sqlx::PgPool;
use time::{Date, Duration};
use tracing::info;
use uuid::Uuid;

use crate::db::models::{NewSlot, Slot};
use crate::db::repositories::{SlotRepository, UserRepository};
use crate::scheduling::clock::{self, Clock, SharedClock};
use crate::scheduling::error::{SchedulingError, SchedulingResult};
use crate::scheduling::generator::{filter_overlapping, SlotInterval, SlotPlan};
use crate::scheduling::subjects::{is_allowed_subject, normalize_subject};

#[derive(Debug, Clone, Copy)]
pub struct TodaysSlotsDeletion {
    pub deleted: u64,
    pub skipped: u64,
    pub date: Date,
}

#[derive(Clone)]
pub struct SlotService {
    pool: PgPool,
    clock: SharedClock,
}

impl SlotService {
    pub fn new(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Create one slot. Overlap with an existing slot of the same faculty is
    /// an error here, unlike bulk generation where candidates are skipped.
    pub async fn create_slot(&self, faculty_id: Uuid, payload: &NewSlot) -> SchedulingResult<Slot> {
        if payload.end_time <= payload.start_time {
            return Err(SchedulingError::validation(
                "End time must be after start time",
            ));
        }
        if clock::is_past(self.clock.as_ref(), payload.start_time) {
            return Err(SchedulingError::validation(
                "Start time must be in the future",
            ));
        }

        let subject = self.resolve_faculty_subject(faculty_id).await?;

        let mut tx = self.pool.begin().await?;
        if SlotRepository::has_overlap(&mut tx, faculty_id, payload.start_time, payload.end_time)
            .await?
        {
            return Err(SchedulingError::validation(
                "This time slot overlaps with an existing slot",
            ));
        }
        let slot = SlotRepository::insert(
            &mut tx,
            faculty_id,
            &subject,
            SlotInterval {
                start_time: payload.start_time,
                end_time: payload.end_time,
            },
        )
        .await?;
        tx.commit().await?;

        info!(slot_id = %slot.id, faculty_id = %faculty_id, "slot created");
        Ok(slot)
    }

    /// Generate and persist slots from a time range. Candidates overlapping
    /// existing slots are silently dropped; the surviving batch commits or
    /// rolls back as one unit. Returns the slots actually persisted.
    pub async fn bulk_create(
        &self,
        faculty_id: Uuid,
        plan: &SlotPlan,
    ) -> SchedulingResult<Vec<Slot>> {
        plan.validate(self.clock.as_ref())?;

        let subject = self.resolve_faculty_subject(faculty_id).await?;

        let mut tx = self.pool.begin().await?;
        let existing =
            SlotRepository::intervals_in_window(&mut tx, faculty_id, plan.start_time, plan.end_time)
                .await?;
        let surviving = filter_overlapping(plan.candidates(), &existing);

        if surviving.is_empty() {
            return Err(SchedulingError::validation(
                "No valid slots could be generated. Check for overlaps or invalid time range.",
            ));
        }

        let created = SlotRepository::insert_batch(&mut tx, faculty_id, &subject, &surviving).await?;
        tx.commit().await?;

        info!(
            faculty_id = %faculty_id,
            created = created.len(),
            skipped = plan.candidates().count() - created.len(),
            "bulk slot creation finished"
        );
        Ok(created)
    }

    /// Delete a slot while it is still deletable: start time in the future
    /// and no confirmed, completed or absent booking attached. Slots with
    /// only cancelled bookings may go.
    pub async fn delete_slot(&self, faculty_id: Uuid, slot_id: Uuid) -> SchedulingResult<()> {
        let mut tx = self.pool.begin().await?;

        let slot = SlotRepository::find_for_update(&mut tx, slot_id)
            .await?
            .ok_or(SchedulingError::SlotNotFound)?;
        if slot.faculty_id != faculty_id {
            return Err(SchedulingError::NotSlotOwner);
        }
        if clock::is_past(self.clock.as_ref(), slot.start_time) {
            return Err(SchedulingError::validation(
                "Cannot delete a slot that has already started",
            ));
        }

        let statuses = SlotRepository::booking_statuses(&mut tx, slot_id).await?;
        let has_history = statuses.iter().any(|s| {
            matches!(
                s,
                crate::db::models::BookingStatus::Confirmed
                    | crate::db::models::BookingStatus::Completed
                    | crate::db::models::BookingStatus::Absent
            )
        });
        if has_history {
            return Err(SchedulingError::validation(
                "Cannot delete a slot that has booking history",
            ));
        }

        SlotRepository::delete(&mut tx, slot_id).await?;
        tx.commit().await?;

        info!(slot_id = %slot_id, faculty_id = %faculty_id, "slot deleted");
        Ok(())
    }

    /// Delete all of the faculty's slots for today (UTC) that are open or
    /// carry only cancelled bookings. Refuses outright while confirmed
    /// bookings exist today; completed/absent history is silently kept.
    pub async fn delete_todays_slots(
        &self,
        faculty_id: Uuid,
    ) -> SchedulingResult<TodaysSlotsDeletion> {
        let today = self.clock.now().date();
        let day_start = today.midnight().assume_utc();
        let day_end = day_start + Duration::days(1);

        let mut tx = self.pool.begin().await?;

        let confirmed =
            SlotRepository::confirmed_count_in_window(&mut tx, faculty_id, day_start, day_end)
                .await?;
        if confirmed > 0 {
            return Err(SchedulingError::Validation(format!(
                "Cannot delete today's slots because you have {} confirmed booking(s). \
                 Cancel those bookings first.",
                confirmed
            )));
        }

        let total = SlotRepository::count_in_window(&mut tx, faculty_id, day_start, day_end).await?;
        let deleted =
            SlotRepository::delete_open_in_window(&mut tx, faculty_id, day_start, day_end).await?;
        tx.commit().await?;

        let result = TodaysSlotsDeletion {
            deleted,
            skipped: (total as u64).saturating_sub(deleted),
            date: today,
        };
        info!(
            faculty_id = %faculty_id,
            deleted = result.deleted,
            skipped = result.skipped,
            "deleted today's open slots"
        );
        Ok(result)
    }

    /// A faculty's subject comes from the assignment mapping, cross-checked
    /// against the subjects of their existing slots. Exactly one allowed
    /// subject must remain after normalization.
    async fn resolve_faculty_subject(&self, faculty_id: Uuid) -> SchedulingResult<String> {
        let faculty = UserRepository::find_by_id(&self.pool, faculty_id)
            .await?
            .ok_or(SchedulingError::NotSlotOwner)?;

        let external_id = faculty.external_id.as_deref().ok_or_else(|| {
            SchedulingError::validation("Faculty subject not configured (missing external id)")
        })?;

        let mut subjects: Vec<String> =
            UserRepository::assignment_subjects_for_teacher(&self.pool, external_id)
                .await?
                .into_iter()
                .chain(SlotRepository::subjects_for_faculty(&self.pool, faculty_id).await?)
                .map(|s| normalize_subject(&s))
                .filter(|s| is_allowed_subject(s))
                .collect();
        subjects.sort();
        subjects.dedup();

        match subjects.as_slice() {
            [] => Err(SchedulingError::validation(
                "Faculty subject not configured. Add a valid subject mapping first.",
            )),
            [subject] => Ok(subject.clone()),
            _ => Err(SchedulingError::validation(
                "Invalid faculty subject mapping: faculty must be assigned to exactly one subject.",
            )),
        }
    }
}
