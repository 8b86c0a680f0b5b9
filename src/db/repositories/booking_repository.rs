use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{
    AbsentStudentRow, BlockedSubjectRow, Booking, BookingDetail, BookingStatus,
};

const BOOKING_COLUMNS: &str = "id, slot_id, student_id, group_id, status, cancellation_reason, \
     cancelled_at, marked_absent_at, rebooking_allowed, created_at, updated_at";

const DETAIL_SELECT: &str = r#"
    SELECT b.id, b.slot_id, b.student_id, b.group_id, b.status,
           b.cancellation_reason, b.cancelled_at, b.marked_absent_at,
           b.rebooking_allowed, b.created_at,
           s.subject, s.start_time AS slot_start_time, s.end_time AS slot_end_time,
           s.faculty_id, f.name AS faculty_name,
           st.name AS student_name, st.email AS student_email
    FROM bookings b
    JOIN slots s ON s.id = b.slot_id
    JOIN users f ON f.id = s.faculty_id
    JOIN users st ON st.id = b.student_id
"#;

pub struct BookingRepository;

impl BookingRepository {
    /// Insert the confirmed booking row. The partial unique index on
    /// (slot_id) WHERE status = 'confirmed' backstops concurrent claims.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        slot_id: Uuid,
        student_id: Uuid,
        group_id: &str,
    ) -> Result<Booking, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings (slot_id, student_id, group_id, status)
            VALUES ($1, $2, $3, 'confirmed')
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(slot_id)
        .bind(student_id)
        .bind(group_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn confirmed_exists_for_slot(
        tx: &mut Transaction<'_, Postgres>,
        slot_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE slot_id = $1 AND status = 'confirmed')",
        )
        .bind(slot_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    /// One confirmed booking per subject per student: subject is the
    /// partition key, not the slot.
    pub async fn confirmed_exists_for_subject(
        tx: &mut Transaction<'_, Postgres>,
        student_id: Uuid,
        subject: &str,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings b
                JOIN slots s ON s.id = b.slot_id
                WHERE b.student_id = $1 AND b.status = 'confirmed' AND s.subject = $2
            )
            "#,
        )
        .bind(student_id)
        .bind(subject)
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    /// The student's most recent absent booking for a subject. Only this row
    /// decides the absence block; older absences are history.
    pub async fn latest_absent_for_subject(
        tx: &mut Transaction<'_, Postgres>,
        student_id: Uuid,
        subject: &str,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT b.id, b.slot_id, b.student_id, b.group_id, b.status,
                   b.cancellation_reason, b.cancelled_at, b.marked_absent_at,
                   b.rebooking_allowed, b.created_at, b.updated_at
            FROM bookings b
            JOIN slots s ON s.id = b.slot_id
            WHERE b.student_id = $1 AND b.status = 'absent' AND s.subject = $2
            ORDER BY b.marked_absent_at DESC NULLS LAST, b.updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(subject)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn mark_cancelled(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        reason: &str,
        cancelled_at: OffsetDateTime,
    ) -> Result<Booking, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = 'cancelled', cancelled_at = $2, cancellation_reason = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking_id)
        .bind(cancelled_at)
        .bind(reason)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn mark_completed(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> Result<Booking, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn mark_absent(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        marked_absent_at: OffsetDateTime,
    ) -> Result<Booking, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = 'absent', marked_absent_at = $2, rebooking_allowed = FALSE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking_id)
        .bind(marked_absent_at)
        .fetch_one(&mut **tx)
        .await
    }

    /// Lift the absence block on one specific absent booking.
    pub async fn allow_rebooking(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
    ) -> Result<Booking, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET rebooking_allowed = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn detail(
        pool: &PgPool,
        booking_id: Uuid,
    ) -> Result<Option<BookingDetail>, sqlx::Error> {
        sqlx::query_as::<_, BookingDetail>(&format!("{DETAIL_SELECT} WHERE b.id = $1"))
            .bind(booking_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_student(
        pool: &PgPool,
        student_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingDetail>, sqlx::Error> {
        sqlx::query_as::<_, BookingDetail>(&format!(
            r#"
            {DETAIL_SELECT}
            WHERE b.student_id = $1 AND ($2::booking_status IS NULL OR b.status = $2)
            ORDER BY b.created_at DESC
            "#
        ))
        .bind(student_id)
        .bind(status)
        .fetch_all(pool)
        .await
    }

    /// The student's active bookings, ordered by slot start.
    pub async fn list_confirmed_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<BookingDetail>, sqlx::Error> {
        sqlx::query_as::<_, BookingDetail>(&format!(
            r#"
            {DETAIL_SELECT}
            WHERE b.student_id = $1 AND b.status = 'confirmed'
            ORDER BY s.start_time
            "#
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_for_faculty(
        pool: &PgPool,
        faculty_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<BookingDetail>, sqlx::Error> {
        sqlx::query_as::<_, BookingDetail>(&format!(
            r#"
            {DETAIL_SELECT}
            WHERE s.faculty_id = $1 AND ($2::booking_status IS NULL OR b.status = $2)
            ORDER BY b.created_at DESC
            "#
        ))
        .bind(faculty_id)
        .bind(status)
        .fetch_all(pool)
        .await
    }

    /// Subjects the student currently holds a confirmed booking for.
    pub async fn confirmed_subjects_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT s.subject
            FROM bookings b
            JOIN slots s ON s.id = b.slot_id
            WHERE b.student_id = $1 AND b.status = 'confirmed'
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(subject,)| subject).collect())
    }

    /// Subjects blocked for the student: for each subject, the most recent
    /// absent booking decides; it blocks while rebooking_allowed is false.
    pub async fn blocked_subjects(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<BlockedSubjectRow>, sqlx::Error> {
        sqlx::query_as::<_, BlockedSubjectRow>(
            r#"
            SELECT subject, booking_id, marked_absent_at
            FROM (
                SELECT DISTINCT ON (s.subject)
                       s.subject, b.id AS booking_id, b.marked_absent_at,
                       b.rebooking_allowed
                FROM bookings b
                JOIN slots s ON s.id = b.slot_id
                WHERE b.student_id = $1 AND b.status = 'absent'
                ORDER BY s.subject, b.marked_absent_at DESC NULLS LAST, b.updated_at DESC
            ) latest
            WHERE latest.rebooking_allowed = FALSE
            ORDER BY subject
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    /// Latest unresolved absence per (student, subject) on this faculty's
    /// slots, for the absence follow-up view.
    pub async fn unresolved_absences_for_faculty(
        pool: &PgPool,
        faculty_id: Uuid,
    ) -> Result<Vec<AbsentStudentRow>, sqlx::Error> {
        sqlx::query_as::<_, AbsentStudentRow>(
            r#"
            SELECT booking_id, student_id, student_name, student_email, subject,
                   marked_absent_at, slot_id, slot_start_time, slot_end_time
            FROM (
                SELECT DISTINCT ON (b.student_id, s.subject)
                       b.id AS booking_id, b.student_id,
                       u.name AS student_name, u.email AS student_email,
                       s.subject, b.marked_absent_at, b.rebooking_allowed,
                       s.id AS slot_id, s.start_time AS slot_start_time,
                       s.end_time AS slot_end_time
                FROM bookings b
                JOIN slots s ON s.id = b.slot_id
                JOIN users u ON u.id = b.student_id
                WHERE s.faculty_id = $1 AND b.status = 'absent'
                ORDER BY b.student_id, s.subject,
                         b.marked_absent_at DESC NULLS LAST, b.updated_at DESC
            ) latest
            WHERE latest.rebooking_allowed = FALSE
            ORDER BY marked_absent_at DESC NULLS LAST
            "#,
        )
        .bind(faculty_id)
        .fetch_all(pool)
        .await
    }
}
