use axum::routing::{delete, get, post};
use axum::Router;

use super::handlers::{
    bulk_create_slots, create_slot, delete_slot, delete_todays_slots, get_availability,
    list_faculty_slots, list_visible_slots, set_availability, teacher_status,
};
use crate::app_state::AppState;

pub fn faculty_slot_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_slot).get(list_faculty_slots))
        .route("/bulk-create", post(bulk_create_slots))
        .route("/today", delete(delete_todays_slots))
        .route("/availability", get(get_availability).post(set_availability))
        .route("/{id}", delete(delete_slot))
}

pub fn student_slot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_visible_slots))
        .route("/teacher-status", get(teacher_status))
}
