use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use time::OffsetDateTime;
use validator::Validate;

/// Booking lifecycle. `confirmed` is the only state new rows are created in;
/// `cancelled` and `completed` are terminal; `absent` stays absent and gates
/// rebooking for the subject until faculty lift the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
    Absent,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Absent => "absent",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "absent" => Ok(BookingStatus::Absent),
            other => Err(format!("Unknown booking status: {}", other)),
        }
    }
}

/// A student's claim on a slot. The booking carries its own lifecycle
/// independent of the slot record; the slot only holds a weak back-reference.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub student_id: Uuid,
    pub group_id: String,
    pub status: BookingStatus,
    pub cancellation_reason: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub marked_absent_at: Option<OffsetDateTime>,
    pub rebooking_allowed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Payload for creating a booking.
#[derive(Debug, Deserialize, Validate)]
pub struct NewBooking {
    pub slot_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "group_id is required"))]
    pub group_id: String,
}

/// Payload for cancelling a booking.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelBooking {
    #[validate(length(max = 500, message = "Reason too long"))]
    pub reason: Option<String>,
}

/// Booking joined with its slot, faculty and student for API responses.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BookingDetail {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub student_id: Uuid,
    pub group_id: String,
    pub status: BookingStatus,
    pub cancellation_reason: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub marked_absent_at: Option<OffsetDateTime>,
    pub rebooking_allowed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub slot_start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub slot_end_time: OffsetDateTime,
    pub faculty_id: Uuid,
    pub faculty_name: String,
    pub student_name: String,
    pub student_email: String,
}

/// One unresolved absence block, keyed by subject.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BlockedSubjectRow {
    pub subject: String,
    pub booking_id: Uuid,
    #[serde(with = "time::serde::rfc3339::option")]
    pub marked_absent_at: Option<OffsetDateTime>,
}

/// Faculty view of the latest unresolved absence per (student, subject).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AbsentStudentRow {
    pub booking_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub marked_absent_at: Option<OffsetDateTime>,
    pub slot_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub slot_start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub slot_end_time: OffsetDateTime,
}
