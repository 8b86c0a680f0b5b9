use thiserror::Error;

/// Errors produced by the scheduling core. Each named condition carries its
/// own message so the transport layer can surface it verbatim.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Slot not found")]
    SlotNotFound,

    #[error("This slot is already booked")]
    SlotAlreadyBooked,

    #[error("You already have an active booking for {0}")]
    DuplicateActiveBooking(String),

    #[error(
        "Booking for {0} is blocked because you were marked absent. \
         Your faculty must allow rebooking before you can book another slot."
    )]
    SubjectBlocked(String),

    #[error("Faculty is currently busy and not accepting bookings")]
    FacultyUnavailable,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Only confirmed bookings can be {action}")]
    NotConfirmed { action: &'static str },

    #[error("Only absent bookings can be approved for rebooking")]
    NotAbsent,

    #[error("Cancellation is not allowed within {hours} hours of the scheduled slot")]
    WithinCancellationWindow { hours: i64 },

    #[error("Not allowed")]
    NotSlotOwner,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl SchedulingError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;
