use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::{StudentTeacherAssignment, User, UserRole};

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, role, external_id, is_available_for_booking,
                   is_active, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Faculty rows matching a set of external teacher ids, used to resolve a
    /// student's mentor set into local users.
    pub async fn find_faculty_by_external_ids(
        pool: &PgPool,
        external_ids: &[String],
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, role, external_id, is_available_for_booking,
                   is_active, created_at, updated_at
            FROM users
            WHERE role = $1 AND external_id = ANY($2)
            "#,
        )
        .bind(UserRole::Faculty)
        .bind(external_ids)
        .fetch_all(pool)
        .await
    }

    /// Availability gate read. A faculty with no prior toggle defaults to
    /// available; a missing row reads as available too, since the gate is
    /// advisory per-faculty state, not an existence check.
    pub async fn get_availability(pool: &PgPool, faculty_id: Uuid) -> Result<bool, sqlx::Error> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_available_for_booking FROM users WHERE id = $1")
                .bind(faculty_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(available,)| available).unwrap_or(true))
    }

    /// Availability gate write. Returns the stored value, or an error when
    /// the target is not a faculty user.
    pub async fn set_availability(
        pool: &PgPool,
        faculty_id: Uuid,
        available: bool,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            r#"
            UPDATE users
            SET is_available_for_booking = $2, updated_at = NOW()
            WHERE id = $1 AND role = $3
            RETURNING is_available_for_booking
            "#,
        )
        .bind(faculty_id)
        .bind(available)
        .bind(UserRole::Faculty)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Gate read inside a booking transaction, against the slot owner's row.
    pub async fn availability_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        faculty_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_available_for_booking FROM users WHERE id = $1")
                .bind(faculty_id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(row.map(|(available,)| available).unwrap_or(true))
    }

    pub async fn assignments_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<StudentTeacherAssignment>, sqlx::Error> {
        sqlx::query_as::<_, StudentTeacherAssignment>(
            r#"
            SELECT id, student_id, teacher_external_id, subject, created_at, updated_at
            FROM student_teacher_assignments
            WHERE student_id = $1
            ORDER BY subject
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    /// Subjects a faculty member is assigned to evaluate, from the external
    /// assignment mapping.
    pub async fn assignment_subjects_for_teacher(
        pool: &PgPool,
        teacher_external_id: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT subject
            FROM student_teacher_assignments
            WHERE teacher_external_id = $1
            "#,
        )
        .bind(teacher_external_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(subject,)| subject).collect())
    }
}
