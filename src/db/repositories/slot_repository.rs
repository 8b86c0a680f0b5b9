use sqlx::{PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::db::models::{FacultySlotRow, Slot, VisibleSlotRow};
use crate::scheduling::generator::SlotInterval;

const SLOT_COLUMNS: &str = "id, faculty_id, subject, start_time, end_time, created_at, updated_at";

pub struct SlotRepository;

impl SlotRepository {
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
        subject: &str,
        interval: SlotInterval,
    ) -> Result<Slot, sqlx::Error> {
        sqlx::query_as::<_, Slot>(
            r#"
            INSERT INTO slots (faculty_id, subject, start_time, end_time)
            VALUES ($1, $2, $3, $4)
            RETURNING id, faculty_id, subject, start_time, end_time, created_at, updated_at
            "#,
        )
        .bind(faculty_id)
        .bind(subject)
        .bind(interval.start_time)
        .bind(interval.end_time)
        .fetch_one(&mut **tx)
        .await
    }

    /// Persist a batch of generated intervals. Runs inside the caller's
    /// transaction so the batch commits or rolls back as one unit.
    pub async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
        subject: &str,
        intervals: &[SlotInterval],
    ) -> Result<Vec<Slot>, sqlx::Error> {
        let mut created = Vec::with_capacity(intervals.len());
        for interval in intervals {
            created.push(Self::insert(tx, faculty_id, subject, *interval).await?);
        }
        Ok(created)
    }

    pub async fn find_by_id(pool: &PgPool, slot_id: Uuid) -> Result<Option<Slot>, sqlx::Error> {
        sqlx::query_as::<_, Slot>(&format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = $1"))
            .bind(slot_id)
            .fetch_optional(pool)
            .await
    }

    /// Lock the slot row against concurrent booking attempts for the
    /// duration of the enclosing transaction.
    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        slot_id: Uuid,
    ) -> Result<Option<Slot>, sqlx::Error> {
        sqlx::query_as::<_, Slot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE id = $1 FOR UPDATE"
        ))
        .bind(slot_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Existing intervals of a faculty that intersect the given window.
    /// The generator skips candidates colliding with any of these.
    pub async fn intervals_in_window(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
        window_start: OffsetDateTime,
        window_end: OffsetDateTime,
    ) -> Result<Vec<SlotInterval>, sqlx::Error> {
        let rows: Vec<(OffsetDateTime, OffsetDateTime)> = sqlx::query_as(
            r#"
            SELECT start_time, end_time
            FROM slots
            WHERE faculty_id = $1 AND start_time < $3 AND end_time > $2
            ORDER BY start_time
            "#,
        )
        .bind(faculty_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(start_time, end_time)| SlotInterval {
                start_time,
                end_time,
            })
            .collect())
    }

    pub async fn has_overlap(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
        start_time: OffsetDateTime,
        end_time: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM slots
                WHERE faculty_id = $1 AND start_time < $3 AND end_time > $2
            )
            "#,
        )
        .bind(faculty_id)
        .bind(start_time)
        .bind(end_time)
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    /// Faculty's own slots with their most recent booking, optionally
    /// restricted to one calendar day and/or the future.
    pub async fn list_for_faculty(
        pool: &PgPool,
        faculty_id: Uuid,
        day: Option<Date>,
        future_after: Option<OffsetDateTime>,
    ) -> Result<Vec<FacultySlotRow>, sqlx::Error> {
        let (day_start, day_end) = match day {
            Some(d) => {
                let start = d.midnight().assume_utc();
                (Some(start), Some(start + time::Duration::days(1)))
            }
            None => (None, None),
        };

        sqlx::query_as::<_, FacultySlotRow>(
            r#"
            SELECT s.id, s.subject, s.start_time, s.end_time,
                   b.id AS booking_id, b.status AS booking_status,
                   u.name AS student_name, u.email AS student_email
            FROM slots s
            LEFT JOIN LATERAL (
                SELECT id, status, student_id
                FROM bookings
                WHERE slot_id = s.id
                ORDER BY created_at DESC
                LIMIT 1
            ) b ON TRUE
            LEFT JOIN users u ON u.id = b.student_id
            WHERE s.faculty_id = $1
              AND ($2::timestamptz IS NULL OR s.start_time >= $2)
              AND ($3::timestamptz IS NULL OR s.start_time < $3)
              AND ($4::timestamptz IS NULL OR s.start_time > $4)
            ORDER BY s.start_time
            "#,
        )
        .bind(faculty_id)
        .bind(day_start)
        .bind(day_end)
        .bind(future_after)
        .fetch_all(pool)
        .await
    }

    /// Candidate slots owned by any of the given mentors, annotated with the
    /// data the eligibility filter needs.
    pub async fn candidates_for_mentors(
        pool: &PgPool,
        mentor_external_ids: &[String],
    ) -> Result<Vec<VisibleSlotRow>, sqlx::Error> {
        sqlx::query_as::<_, VisibleSlotRow>(
            r#"
            SELECT s.id, s.subject, s.start_time, s.end_time,
                   s.faculty_id, u.name AS faculty_name, u.email AS faculty_email,
                   u.external_id AS faculty_external_id,
                   u.is_available_for_booking AS faculty_available,
                   EXISTS (
                       SELECT 1 FROM bookings b
                       WHERE b.slot_id = s.id AND b.status = 'confirmed'
                   ) AS has_confirmed_booking
            FROM slots s
            JOIN users u ON u.id = s.faculty_id
            WHERE u.external_id = ANY($1)
            ORDER BY s.start_time
            "#,
        )
        .bind(mentor_external_ids)
        .fetch_all(pool)
        .await
    }

    /// Distinct subjects this faculty has offered slots for.
    pub async fn subjects_for_faculty(
        pool: &PgPool,
        faculty_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT subject FROM slots WHERE faculty_id = $1")
                .bind(faculty_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(subject,)| subject).collect())
    }

    /// Booking statuses attached to a slot, for the deletion safety rule.
    pub async fn booking_statuses(
        tx: &mut Transaction<'_, Postgres>,
        slot_id: Uuid,
    ) -> Result<Vec<crate::db::models::BookingStatus>, sqlx::Error> {
        let rows: Vec<(crate::db::models::BookingStatus,)> =
            sqlx::query_as("SELECT status FROM bookings WHERE slot_id = $1")
                .bind(slot_id)
                .fetch_all(&mut **tx)
                .await?;
        Ok(rows.into_iter().map(|(status,)| status).collect())
    }

    pub async fn delete(
        tx: &mut Transaction<'_, Postgres>,
        slot_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM slots WHERE id = $1")
            .bind(slot_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Count confirmed bookings on the faculty's slots within a day window.
    pub async fn confirmed_count_in_window(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
        window_start: OffsetDateTime,
        window_end: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM bookings b
            JOIN slots s ON s.id = b.slot_id
            WHERE s.faculty_id = $1 AND b.status = 'confirmed'
              AND s.start_time >= $2 AND s.start_time < $3
            "#,
        )
        .bind(faculty_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    pub async fn count_in_window(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
        window_start: OffsetDateTime,
        window_end: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM slots
            WHERE faculty_id = $1 AND start_time >= $2 AND start_time < $3
            "#,
        )
        .bind(faculty_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    /// Delete the faculty's slots inside the window that are open or carry
    /// only cancelled bookings. Confirmed, completed and absent history is
    /// preserved. Returns the number of rows deleted.
    pub async fn delete_open_in_window(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
        window_start: OffsetDateTime,
        window_end: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM slots s
            WHERE s.faculty_id = $1 AND s.start_time >= $2 AND s.start_time < $3
              AND NOT EXISTS (
                  SELECT 1 FROM bookings b
                  WHERE b.slot_id = s.id
                    AND b.status IN ('confirmed', 'completed', 'absent')
              )
            "#,
        )
        .bind(faculty_id)
        .bind(window_start)
        .bind(window_end)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}
