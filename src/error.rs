use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Authentication failed")]
    AuthError,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    TokenInvalid,
    #[error("Invalid CSRF token")]
    CsrfRejected,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::AuthError => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
            }
            AppError::TokenExpired => {
                tracing::debug!("Access token expired");
                (StatusCode::UNAUTHORIZED, "Token expired".to_string())
            }
            AppError::TokenInvalid => {
                tracing::debug!("Access token rejected");
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::CsrfRejected => {
                tracing::warn!("CSRF token mismatch");
                (StatusCode::FORBIDDEN, "Invalid CSRF token".to_string())
            }
            AppError::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Conflict(msg) => {
                tracing::debug!(message = %msg, "Conflict");
                (StatusCode::CONFLICT, msg)
            }
            AppError::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::AuthError, StatusCode::UNAUTHORIZED),
            (AppError::TokenExpired, StatusCode::UNAUTHORIZED),
            (AppError::TokenInvalid, StatusCode::UNAUTHORIZED),
            (AppError::CsrfRejected, StatusCode::FORBIDDEN),
            (AppError::Conflict("username taken".into()), StatusCode::CONFLICT),
            (AppError::BadRequest("missing field".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_unauthorized_variants_stay_distinguishable() {
        assert_eq!(AppError::TokenExpired.to_string(), "Token expired");
        assert_eq!(AppError::TokenInvalid.to_string(), "Invalid token");
        assert_eq!(AppError::AuthError.to_string(), "Authentication failed");
    }
}
