use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    absent_students, allow_rebooking, blocked_subjects, cancel_booking, complete_booking,
    create_booking, current_bookings, faculty_cancel_booking, list_faculty_bookings,
    list_student_bookings, mark_absent,
};
use crate::app_state::AppState;

pub fn student_booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_student_bookings))
        .route("/current", get(current_bookings))
        .route("/blocked-subjects", get(blocked_subjects))
        .route("/{id}/cancel", post(cancel_booking))
}

pub fn faculty_booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_faculty_bookings))
        .route("/absent-students", get(absent_students))
        .route("/{id}/cancel", post(faculty_cancel_booking))
        .route("/{id}/complete", post(complete_booking))
        .route("/{id}/mark-absent", post(mark_absent))
        .route("/{id}/allow-rebooking", post(allow_rebooking))
}
