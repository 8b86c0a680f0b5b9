use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::scheduling::{
    AvailabilityGate, BookingEngine, BookingPolicy, EligibilityFilter, SharedClock, SlotService,
    SystemClock,
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub env: Config,
    pub clock: SharedClock,
    pub engine: BookingEngine,
    pub slots: SlotService,
    pub eligibility: EligibilityFilter,
    pub gate: AvailabilityGate,
}

impl AppState {
    pub fn new(db: PgPool, env: Config) -> Self {
        let clock: SharedClock = Arc::new(SystemClock);
        let policy = BookingPolicy {
            cancellation_window_hours: env.scheduling.cancellation_window_hours,
        };

        Self {
            engine: BookingEngine::new(db.clone(), clock.clone(), policy),
            slots: SlotService::new(db.clone(), clock.clone()),
            eligibility: EligibilityFilter::new(db.clone(), clock.clone()),
            gate: AvailabilityGate::new(db.clone()),
            db,
            env,
            clock,
        }
    }
}
