//! The scheduling core: slot generation, the booking state machine, the
//! availability gate, student eligibility and the policy clock.

pub mod availability;
pub mod clock;
pub mod eligibility;
pub mod engine;
mod error;
pub mod generator;
pub mod slots;
pub mod subjects;

#[cfg(test)]
mod pg_tests;

pub use availability::AvailabilityGate;
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use eligibility::EligibilityFilter;
pub use engine::{Actor, BookingEngine, BookingPolicy};
pub use error::{SchedulingError, SchedulingResult};
pub use slots::SlotService;
