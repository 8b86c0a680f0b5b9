use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::AuthPrincipal;
use crate::db::models::{
    AbsentStudentRow, BookingDetail, BookingStatus, CancelBooking, NewBooking,
};
use crate::db::repositories::BookingRepository;
use crate::error::{AppError, AppResult};
use crate::scheduling::Actor;

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub confirmed_only: Option<bool>,
}

fn parse_status(raw: Option<&str>) -> AppResult<Option<BookingStatus>> {
    match raw {
        Some(s) => s
            .parse::<BookingStatus>()
            .map(Some)
            .map_err(AppError::BadRequest),
        None => Ok(None),
    }
}

async fn detail_of(state: &AppState, booking_id: Uuid) -> AppResult<BookingDetail> {
    BookingRepository::detail(&state.db, booking_id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Booking vanished after update".to_string()))
}

// ---- Student ----

pub async fn create_booking(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(payload): Json<NewBooking>,
) -> AppResult<(StatusCode, Json<BookingDetail>)> {
    principal.require_student()?;
    payload.validate()?;

    let booking = state
        .engine
        .create_booking(principal.id, payload.slot_id, &payload.group_id)
        .await?;
    let detail = detail_of(&state, booking.id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_student_bookings(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<Vec<BookingDetail>>> {
    principal.require_student()?;

    let status = parse_status(query.status.as_deref())?;
    let bookings = BookingRepository::list_for_student(&state.db, principal.id, status).await?;
    Ok(Json(bookings))
}

/// The student's active bookings: at most one confirmed booking per subject,
/// ordered by slot start.
pub async fn current_bookings(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> AppResult<Json<Vec<BookingDetail>>> {
    principal.require_student()?;

    let bookings = BookingRepository::list_confirmed_for_student(&state.db, principal.id).await?;
    Ok(Json(bookings))
}

pub async fn blocked_subjects(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> AppResult<Json<Value>> {
    principal.require_student()?;

    let blocked = state.eligibility.blocked_subjects(principal.id).await?;
    Ok(Json(json!({ "blocked_subjects": blocked })))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CancelBooking>,
) -> AppResult<Json<BookingDetail>> {
    principal.require_student()?;
    payload.validate()?;

    let reason = payload.reason.as_deref().unwrap_or("");
    state
        .engine
        .cancel_booking(Actor::Student(principal.id), booking_id, reason)
        .await?;
    Ok(Json(detail_of(&state, booking_id).await?))
}

// ---- Faculty ----

pub async fn list_faculty_bookings(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<Vec<BookingDetail>>> {
    principal.require_faculty()?;

    let status = if query.confirmed_only.unwrap_or(false) {
        Some(BookingStatus::Confirmed)
    } else {
        parse_status(query.status.as_deref())?
    };
    let bookings = BookingRepository::list_for_faculty(&state.db, principal.id, status).await?;
    Ok(Json(bookings))
}

pub async fn faculty_cancel_booking(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CancelBooking>,
) -> AppResult<Json<BookingDetail>> {
    principal.require_faculty()?;
    payload.validate()?;

    let reason = payload.reason.as_deref().unwrap_or("");
    state
        .engine
        .cancel_booking(Actor::Faculty(principal.id), booking_id, reason)
        .await?;
    Ok(Json(detail_of(&state, booking_id).await?))
}

pub async fn complete_booking(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingDetail>> {
    principal.require_faculty()?;

    state.engine.complete_booking(principal.id, booking_id).await?;
    Ok(Json(detail_of(&state, booking_id).await?))
}

pub async fn mark_absent(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingDetail>> {
    principal.require_faculty()?;

    state.engine.mark_absent(principal.id, booking_id).await?;
    Ok(Json(detail_of(&state, booking_id).await?))
}

pub async fn allow_rebooking(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingDetail>> {
    principal.require_faculty()?;

    state.engine.allow_rebooking(principal.id, booking_id).await?;
    Ok(Json(detail_of(&state, booking_id).await?))
}

/// Latest unresolved absence per (student, subject) on this faculty's slots.
pub async fn absent_students(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> AppResult<Json<Vec<AbsentStudentRow>>> {
    principal.require_faculty()?;

    let absences =
        BookingRepository::unresolved_absences_for_faculty(&state.db, principal.id).await?;
    Ok(Json(absences))
}
