// API error type and response mapping.
// Decision: Operational errors keep their message; anything else becomes a
// generic 500 with the detail logged (and echoed only in development).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::OnceLock;
use wayfarer_core::Error;

/// Whether responses may carry internal error detail. Set once at startup.
static EXPOSE_ERROR_DETAIL: OnceLock<bool> = OnceLock::new();

pub fn set_expose_error_detail(expose: bool) {
    let _ = EXPOSE_ERROR_DETAIL.set(expose);
}

fn expose_error_detail() -> bool {
    *EXPOSE_ERROR_DETAIL.get_or_init(|| true)
}

#[derive(Debug)]
pub struct ApiError(pub Error);

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// Database failures surface as anyhow from the storage crate. Constraint
/// violations are user errors, not server faults, so they are downcast and
/// translated before falling through to 500.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(db_err) = find_database_error(&err) {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return Self(Error::Conflict(conflict_message(db_err.constraint())))
                }
                Some("23503") => {
                    return Self(Error::Validation(
                        "Referenced record does not exist".to_string(),
                    ))
                }
                Some("23514") => {
                    return Self(Error::Validation("Value out of allowed range".to_string()))
                }
                _ => {}
            }
        }
        Self(Error::Internal(err))
    }
}

fn find_database_error(err: &anyhow::Error) -> Option<&dyn sqlx::error::DatabaseError> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .find_map(|e| e.as_database_error())
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("users_email_key") => "Email already in use".to_string(),
        Some("tours_name_key") => "A tour with that name already exists".to_string(),
        Some("reviews_tour_author_key") => "You have already reviewed this tour".to_string(),
        _ => "Duplicate value".to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let detail = if self.0.is_operational() {
            None
        } else {
            tracing::error!(error = ?self.0, "Unhandled error");
            expose_error_detail().then(|| format!("{:?}", self.0))
        };

        let body = ErrorBody {
            status: if status.is_client_error() {
                "fail"
            } else {
                "error"
            },
            message: self.0.to_string(),
            detail,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operational_error_status() {
        let err = ApiError(Error::NotFound("tour"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err = ApiError(Error::validation("bad input"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_maps_to_500() {
        let err = ApiError::from(anyhow::anyhow!("boom"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        assert_eq!(conflict_message(Some("users_email_key")), "Email already in use");
        assert_eq!(
            conflict_message(Some("reviews_tour_author_key")),
            "You have already reviewed this tour"
        );
        assert_eq!(conflict_message(None), "Duplicate value");
    }
}
