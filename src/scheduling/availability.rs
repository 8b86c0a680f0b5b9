use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::UserRepository;
use crate::scheduling::error::SchedulingResult;

/// Per-faculty availability flag gating whether that faculty's slots are
/// visible to students. Defaults to available, persists until the next
/// toggle, and has no side effects on existing slots or bookings.
#[derive(Clone)]
pub struct AvailabilityGate {
    pool: PgPool,
}

impl AvailabilityGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, faculty_id: Uuid) -> SchedulingResult<bool> {
        Ok(UserRepository::get_availability(&self.pool, faculty_id).await?)
    }

    pub async fn set(&self, faculty_id: Uuid, available: bool) -> SchedulingResult<bool> {
        let stored = UserRepository::set_availability(&self.pool, faculty_id, available).await?;
        info!(faculty_id = %faculty_id, available = stored, "faculty availability updated");
        Ok(stored)
    }
}
