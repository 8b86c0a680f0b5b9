//! Read-only visibility computation for students.
//!
//! The filter mirrors the booking engine's create preconditions so the UI
//! can pre-filter, but it is advisory: the engine re-validates atomically at
//! write time. The decision function is pure; data loading is separate so
//! the rules are unit-testable without a database.

use std::collections::HashSet;

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{BlockedSubjectRow, VisibleSlotRow};
use crate::db::repositories::{BookingRepository, SlotRepository, UserRepository};
use crate::scheduling::clock::{Clock, SharedClock};
use crate::scheduling::error::SchedulingResult;
use crate::scheduling::subjects::normalize_subject;

/// Everything about a student the visibility decision needs.
#[derive(Debug, Default)]
pub struct StudentSnapshot {
    /// (teacher_external_id, subject) pairs from the assignment mapping.
    pub assignments: Vec<(String, String)>,
    /// Subjects with a confirmed booking.
    pub confirmed_subjects: HashSet<String>,
    /// Subjects blocked by an unresolved absence.
    pub blocked_subjects: HashSet<String>,
}

/// A slot is bookable iff its faculty is one of the student's mentors for
/// the slot's subject, the faculty's availability gate is on, the slot is in
/// the future and unclaimed, and the subject is neither already booked nor
/// blocked by an unresolved absence.
pub fn is_bookable(
    snapshot: &StudentSnapshot,
    candidate: &VisibleSlotRow,
    now: OffsetDateTime,
) -> bool {
    let subject = normalize_subject(&candidate.subject);

    let assigned = match &candidate.faculty_external_id {
        Some(external_id) => snapshot
            .assignments
            .iter()
            .any(|(teacher, assigned_subject)| {
                teacher == external_id && normalize_subject(assigned_subject) == subject
            }),
        None => false,
    };

    assigned
        && candidate.faculty_available
        && candidate.start_time > now
        && !candidate.has_confirmed_booking
        && !snapshot.confirmed_subjects.contains(&subject)
        && !snapshot.blocked_subjects.contains(&subject)
}

#[derive(Clone)]
pub struct EligibilityFilter {
    pool: PgPool,
    clock: SharedClock,
}

impl EligibilityFilter {
    pub fn new(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Slots the student may book right now. A student with no assignments
    /// sees nothing; there is no fallback to showing all slots.
    pub async fn visible_slots(&self, student_id: Uuid) -> SchedulingResult<Vec<VisibleSlotRow>> {
        let snapshot = self.snapshot(student_id).await?;
        if snapshot.assignments.is_empty() {
            return Ok(Vec::new());
        }

        let mentor_ids: Vec<String> = snapshot
            .assignments
            .iter()
            .map(|(teacher, _)| teacher.clone())
            .collect();
        let candidates = SlotRepository::candidates_for_mentors(&self.pool, &mentor_ids).await?;

        let now = self.clock.now();
        Ok(candidates
            .into_iter()
            .filter(|candidate| is_bookable(&snapshot, candidate, now))
            .collect())
    }

    pub async fn blocked_subjects(
        &self,
        student_id: Uuid,
    ) -> SchedulingResult<Vec<BlockedSubjectRow>> {
        Ok(BookingRepository::blocked_subjects(&self.pool, student_id).await?)
    }

    async fn snapshot(&self, student_id: Uuid) -> SchedulingResult<StudentSnapshot> {
        let assignments = UserRepository::assignments_for_student(&self.pool, student_id)
            .await?
            .into_iter()
            .map(|a| (a.teacher_external_id, a.subject))
            .collect();

        let confirmed_subjects =
            BookingRepository::confirmed_subjects_for_student(&self.pool, student_id)
                .await?
                .into_iter()
                .map(|s| normalize_subject(&s))
                .collect();

        let blocked_subjects = BookingRepository::blocked_subjects(&self.pool, student_id)
            .await?
            .into_iter()
            .map(|row| normalize_subject(&row.subject))
            .collect();

        Ok(StudentSnapshot {
            assignments,
            confirmed_subjects,
            blocked_subjects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn candidate(subject: &str) -> VisibleSlotRow {
        VisibleSlotRow {
            id: Uuid::nil(),
            subject: subject.to_string(),
            start_time: datetime!(2026-03-12 09:00 UTC),
            end_time: datetime!(2026-03-12 09:15 UTC),
            faculty_id: Uuid::nil(),
            faculty_name: "Dr. Chen".into(),
            faculty_email: "chen@example.edu".into(),
            faculty_external_id: Some("pbl-42".into()),
            faculty_available: true,
            has_confirmed_booking: false,
        }
    }

    fn snapshot() -> StudentSnapshot {
        StudentSnapshot {
            assignments: vec![("pbl-42".into(), "Web Development".into())],
            confirmed_subjects: HashSet::new(),
            blocked_subjects: HashSet::new(),
        }
    }

    const NOW: OffsetDateTime = datetime!(2026-03-10 12:00 UTC);

    #[test]
    fn assigned_open_future_slot_is_bookable() {
        assert!(is_bookable(&snapshot(), &candidate("Web Development"), NOW));
    }

    #[test]
    fn unassigned_faculty_is_invisible() {
        let mut c = candidate("Web Development");
        c.faculty_external_id = Some("pbl-99".into());
        assert!(!is_bookable(&snapshot(), &c, NOW));

        c.faculty_external_id = None;
        assert!(!is_bookable(&snapshot(), &c, NOW));
    }

    #[test]
    fn subject_must_match_the_assignment() {
        let c = candidate("Compiler Design");
        assert!(!is_bookable(&snapshot(), &c, NOW));
    }

    #[test]
    fn busy_faculty_contributes_no_slots() {
        let mut c = candidate("Web Development");
        c.faculty_available = false;
        assert!(!is_bookable(&snapshot(), &c, NOW));
    }

    #[test]
    fn past_slots_are_not_bookable() {
        let c = candidate("Web Development");
        let late = datetime!(2026-03-12 09:00 UTC);
        assert!(!is_bookable(&snapshot(), &c, late));
    }

    #[test]
    fn claimed_slots_are_hidden() {
        let mut c = candidate("Web Development");
        c.has_confirmed_booking = true;
        assert!(!is_bookable(&snapshot(), &c, NOW));
    }

    #[test]
    fn confirmed_subject_hides_further_slots() {
        let mut s = snapshot();
        s.confirmed_subjects.insert("Web Development".into());
        assert!(!is_bookable(&s, &candidate("Web Development"), NOW));
    }

    #[test]
    fn blocked_subject_hides_slots_until_unblocked() {
        let mut s = snapshot();
        s.blocked_subjects.insert("Web Development".into());
        assert!(!is_bookable(&s, &candidate("Web Development"), NOW));

        s.blocked_subjects.clear();
        assert!(is_bookable(&s, &candidate("Web Development"), NOW));
    }
}
