use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::scheduling::SchedulingError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Each named scheduling condition keeps its own status and message so
    /// the UI never has to render a generic failure for them.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Database(err) => match err {
                DatabaseError::NotFound => {
                    (StatusCode::NOT_FOUND, "Resource not found".to_string())
                }
                DatabaseError::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, "Invalid input data".to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                ),
            },
            AppError::Scheduling(err) => {
                let status = match err {
                    SchedulingError::SlotNotFound | SchedulingError::BookingNotFound => {
                        StatusCode::NOT_FOUND
                    }
                    SchedulingError::SlotAlreadyBooked
                    | SchedulingError::DuplicateActiveBooking(_)
                    | SchedulingError::SubjectBlocked(_)
                    | SchedulingError::FacultyUnavailable => StatusCode::CONFLICT,
                    SchedulingError::NotConfirmed { .. }
                    | SchedulingError::NotAbsent
                    | SchedulingError::WithinCancellationWindow { .. }
                    | SchedulingError::Validation(_) => StatusCode::BAD_REQUEST,
                    SchedulingError::NotSlotOwner => StatusCode::FORBIDDEN,
                    SchedulingError::Database(inner) => {
                        return match inner {
                            sqlx::Error::RowNotFound => (
                                StatusCode::NOT_FOUND,
                                "Resource not found".to_string(),
                            ),
                            _ => (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "An internal server error occurred".to_string(),
                            ),
                        };
                    }
                };
                (status, err.to_string())
            }
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "Authentication failed".to_string(),
            ),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InternalServerError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "details": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(DatabaseError::Sqlx(err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_map_to_409() {
        let (status, message) =
            AppError::Scheduling(SchedulingError::SlotAlreadyBooked).status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "This slot is already booked");

        let (status, _) =
            AppError::Scheduling(SchedulingError::FacultyUnavailable).status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn named_conditions_keep_distinct_messages() {
        let dup = AppError::Scheduling(SchedulingError::DuplicateActiveBooking(
            "Web Development".into(),
        ));
        let blocked =
            AppError::Scheduling(SchedulingError::SubjectBlocked("Web Development".into()));
        let window =
            AppError::Scheduling(SchedulingError::WithinCancellationWindow { hours: 24 });

        let messages = [
            dup.status_and_message().1,
            blocked.status_and_message().1,
            window.status_and_message().1,
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn state_errors_map_to_400() {
        let (status, message) = AppError::Scheduling(SchedulingError::NotConfirmed {
            action: "cancelled",
        })
        .status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("Only confirmed bookings"));
    }

    #[test]
    fn not_found_conditions_map_to_404() {
        let (status, _) =
            AppError::Scheduling(SchedulingError::SlotNotFound).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) =
            AppError::Scheduling(SchedulingError::BookingNotFound).status_and_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
