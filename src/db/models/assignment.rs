use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use time::OffsetDateTime;

/// Mapping of which student is assigned to which teacher for which subject.
///
/// The external PBL system is the source of truth; rows are upserted during
/// SSO login. The scheduler only reads them to enforce visibility rules.
/// Unique per (student, subject): one teacher per subject per student.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct StudentTeacherAssignment {
    pub id: Uuid,
    pub student_id: Uuid,
    /// External PBL id of the teacher; not a FK because the teacher may not
    /// have been synced into the scheduler yet.
    pub teacher_external_id: String,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
