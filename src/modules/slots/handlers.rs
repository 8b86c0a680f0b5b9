use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use time::macros::format_description;
use time::Date;
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::AuthPrincipal;
use crate::db::models::{BulkSlotCreate, FacultySlotRow, NewSlot, Slot, VisibleSlotRow};
use crate::db::repositories::UserRepository;
use crate::error::AppResult;
use crate::scheduling::generator::SlotPlan;
use crate::scheduling::Clock;

#[derive(Debug, Deserialize)]
pub struct SlotListQuery {
    pub date: Option<String>,
    pub future_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}

fn parse_day(raw: Option<&str>) -> Option<Date> {
    // Invalid dates are ignored rather than rejected; the filter is advisory.
    raw.and_then(|d| Date::parse(d, format_description!("[year]-[month]-[day]")).ok())
}

// ---- Faculty ----

pub async fn create_slot(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(payload): Json<NewSlot>,
) -> AppResult<(StatusCode, Json<Slot>)> {
    principal.require_faculty()?;
    payload.validate()?;

    let slot = state.slots.create_slot(principal.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn bulk_create_slots(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(payload): Json<BulkSlotCreate>,
) -> AppResult<(StatusCode, Json<Value>)> {
    principal.require_faculty()?;
    payload.validate()?;

    let plan = SlotPlan {
        start_time: payload.start_time,
        end_time: payload.end_time,
        slot_duration_minutes: payload.slot_duration_minutes,
        break_duration_minutes: payload.break_duration_minutes,
    };
    let created = state.slots.bulk_create(principal.id, &plan).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Successfully created {} slots", created.len()),
            "slots_created": created.len(),
            "slots": created,
        })),
    ))
}

pub async fn list_faculty_slots(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Query(query): Query<SlotListQuery>,
) -> AppResult<Json<Vec<FacultySlotRow>>> {
    principal.require_faculty()?;

    let day = parse_day(query.date.as_deref());
    let future_after = query
        .future_only
        .unwrap_or(true)
        .then(|| state.clock.now());

    let slots = crate::db::repositories::SlotRepository::list_for_faculty(
        &state.db,
        principal.id,
        day,
        future_after,
    )
    .await?;
    Ok(Json(slots))
}

pub async fn delete_slot(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(slot_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    principal.require_faculty()?;

    state.slots.delete_slot(principal.id, slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_todays_slots(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> AppResult<Json<Value>> {
    principal.require_faculty()?;

    let result = state.slots.delete_todays_slots(principal.id).await?;
    Ok(Json(json!({
        "message": "Deleted today's slots successfully",
        "deleted_count": result.deleted,
        "skipped_count": result.skipped,
        "date": result.date.to_string(),
    })))
}

pub async fn get_availability(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> AppResult<Json<Value>> {
    principal.require_faculty()?;

    let is_available = state.gate.get(principal.id).await?;
    Ok(Json(json!({ "is_available": is_available })))
}

pub async fn set_availability(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(payload): Json<AvailabilityUpdate>,
) -> AppResult<Json<Value>> {
    principal.require_faculty()?;

    let is_available = state.gate.set(principal.id, payload.is_available).await?;
    Ok(Json(json!({
        "message": "Availability updated successfully",
        "is_available": is_available,
    })))
}

// ---- Student ----

pub async fn list_visible_slots(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Query(query): Query<SlotListQuery>,
) -> AppResult<Json<Vec<VisibleSlotRow>>> {
    principal.require_student()?;

    let mut slots = state.eligibility.visible_slots(principal.id).await?;
    if let Some(day) = parse_day(query.date.as_deref()) {
        slots.retain(|s| s.start_time.date() == day);
    }
    Ok(Json(slots))
}

/// Availability summary of the student's assigned mentors. When a mentor is
/// busy the UI shows a message instead of an empty slot list.
pub async fn teacher_status(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> AppResult<Json<Value>> {
    principal.require_student()?;

    let assignments = UserRepository::assignments_for_student(&state.db, principal.id).await?;
    if assignments.is_empty() {
        return Ok(Json(json!({
            "has_assignment": false,
            "message": "No mentor assigned",
        })));
    }

    let mentor_ids: Vec<String> = assignments
        .iter()
        .map(|a| a.teacher_external_id.clone())
        .collect();
    let faculty = UserRepository::find_faculty_by_external_ids(&state.db, &mentor_ids).await?;

    let teachers: Vec<Value> = assignments
        .iter()
        .map(|assignment| {
            match faculty
                .iter()
                .find(|f| f.external_id.as_deref() == Some(&assignment.teacher_external_id))
            {
                Some(teacher) => json!({
                    "teacher_name": teacher.name,
                    "subject": assignment.subject,
                    "is_available": teacher.is_available_for_booking,
                }),
                None => json!({
                    "teacher_name": "Unknown",
                    "subject": assignment.subject,
                    "is_available": false,
                }),
            }
        })
        .collect();

    let any_busy = teachers
        .iter()
        .any(|t| t["is_available"] == Value::Bool(false));

    Ok(Json(json!({
        "has_assignment": true,
        "teachers": teachers,
        "any_teacher_busy": any_busy,
        "message": if any_busy {
            Some("Teacher is currently busy. Please check later.")
        } else {
            None
        },
    })))
}
