use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Entity absent, or the caller may not see it. The two cases are
    /// deliberately indistinguishable.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
    },

    #[error("authentication required")]
    NotAuthenticated,

    #[error("session expired or invalid")]
    SessionExpired,

    /// Transactional persistence failure during message creation. The whole
    /// operation rolled back; the caller may retry.
    #[error("failed to save message")]
    ServiceUnavailable,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Validation { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED"),
            AppError::SessionExpired => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
            AppError::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_ERROR"),
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let message = match &self {
            AppError::ServiceUnavailable => {
                "Failed to save message. Please try again.".to_owned()
            }
            AppError::Database(_) | AppError::Internal(_) => {
                "Internal server error.".to_owned()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { code, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request_with_code() {
        let resp = AppError::validation("EMPTY_CONTENT", "Message content cannot be empty.")
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_hides_the_entity_state() {
        let resp = AppError::NotFound("Room").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
