//! Authenticated principal supplied by the external SSO/JWT layer.
//!
//! Identity verification happens upstream; by the time a request reaches
//! these handlers the gateway has validated the token and forwarded the
//! principal as trusted headers. The core only consumes {id, role, email,
//! name}.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::db::models::UserRole;
use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub role: UserRole,
    pub email: String,
    pub name: String,
}

impl AuthPrincipal {
    pub fn require_faculty(&self) -> Result<(), AppError> {
        if self.role == UserRole::Faculty {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Faculty role required".to_string(),
            ))
        }
    }

    pub fn require_student(&self) -> Result<(), AppError> {
        if self.role == UserRole::Student {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Student role required".to_string(),
            ))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Authentication(format!("Missing {} header", name)))
}

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|_| AppError::Authentication("Invalid user id".to_string()))?;
        let role = header(parts, USER_ROLE_HEADER)?
            .parse::<UserRole>()
            .map_err(AppError::Authentication)?;
        let email = header(parts, USER_EMAIL_HEADER)?.to_string();
        let name = header(parts, USER_NAME_HEADER)?.to_string();

        Ok(AuthPrincipal {
            id,
            role,
            email,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extracts_a_full_principal() {
        let id = Uuid::new_v4();
        let parts = parts_with_headers(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "faculty"),
            (USER_EMAIL_HEADER, "chen@example.edu"),
            (USER_NAME_HEADER, "Dr. Chen"),
        ]);
        let mut parts = parts;
        let principal = AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(principal.id, id);
        assert_eq!(principal.role, UserRole::Faculty);
        assert!(principal.require_faculty().is_ok());
        assert!(principal.require_student().is_err());
    }

    #[tokio::test]
    async fn rejects_missing_or_invalid_headers() {
        let mut parts = parts_with_headers(&[]);
        assert!(AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_err());

        let mut parts = parts_with_headers(&[
            (USER_ID_HEADER, "not-a-uuid"),
            (USER_ROLE_HEADER, "student"),
            (USER_EMAIL_HEADER, "s@example.edu"),
            (USER_NAME_HEADER, "Sam"),
        ]);
        assert!(AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_err());

        let id = Uuid::new_v4();
        let mut parts = parts_with_headers(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "admin"),
            (USER_EMAIL_HEADER, "s@example.edu"),
            (USER_NAME_HEADER, "Sam"),
        ]);
        assert!(AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }
}
