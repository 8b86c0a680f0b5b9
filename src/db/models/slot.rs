use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use time::OffsetDateTime;
use validator::Validate;

use crate::db::models::BookingStatus;

/// Availability slot created by faculty. A slot is "booked" when a confirmed
/// booking references it; there is no per-slot flag. Faculty-level visibility
/// is the availability gate on the users table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub faculty_id: Uuid,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Slot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).whole_minutes()
    }
}

/// Payload for creating a single slot. Subject is resolved from the faculty's
/// assignment mapping, not supplied by the client.
#[derive(Debug, Deserialize, Validate)]
pub struct NewSlot {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
}

/// Payload for bulk slot creation from a time range.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkSlotCreate {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub slot_duration_minutes: i64,
    pub break_duration_minutes: i64,
}

/// Faculty view of a slot joined with its most recent booking, if any.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct FacultySlotRow {
    pub id: Uuid,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub booking_id: Option<Uuid>,
    pub booking_status: Option<BookingStatus>,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
}

/// Student view of a bookable slot.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct VisibleSlotRow {
    pub id: Uuid,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub faculty_id: Uuid,
    pub faculty_name: String,
    pub faculty_email: String,
    #[serde(skip)]
    pub faculty_external_id: Option<String>,
    #[serde(skip)]
    pub faculty_available: bool,
    #[serde(skip)]
    pub has_confirmed_booking: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn duration_is_derived_from_the_interval() {
        let slot = Slot {
            id: Uuid::nil(),
            faculty_id: Uuid::nil(),
            subject: "Web Development".into(),
            start_time: datetime!(2026-03-10 09:00 UTC),
            end_time: datetime!(2026-03-10 09:15 UTC),
            created_at: datetime!(2026-03-01 00:00 UTC),
            updated_at: datetime!(2026-03-01 00:00 UTC),
        };
        assert_eq!(slot.duration_minutes(), 15);
    }
}
