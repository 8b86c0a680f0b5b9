mod booking_repository;
mod slot_repository;
mod user_repository;

pub use booking_repository::BookingRepository;
pub use slot_repository::SlotRepository;
pub use user_repository::UserRepository;
