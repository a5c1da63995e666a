//! Centralized error types for the relay.
//!
//! Uses `thiserror` for ergonomic error definitions and provides HTTP-friendly
//! variants that convert directly into API responses of the shape
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Core application error type used across all relay services.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // === Validation ===
    #[error("{message}")]
    Validation { message: String },

    #[error("teamId query parameter is required")]
    MissingTeam,

    // === Authentication ===
    #[error("Missing or malformed credentials")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    // === Federation request authentication ===
    #[error("Missing Signature header on federated request")]
    MissingSignature,

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Request body does not match its Digest header")]
    BodyModified,

    #[error("No registered peer for key ID '{key_id}'")]
    UnknownPeer { key_id: String },

    // === Authorization ===
    #[error("Access denied")]
    Forbidden,

    #[error("Server '{host}' is not trusted by this relay")]
    ServerNotTrusted { host: String },

    #[error("Server '{host}' is blocked by this relay")]
    ServerBlocked { host: String },

    // === Resources ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    // === Federation envelope integrity ===
    #[error("Invalid bundle: {reason}")]
    InvalidBundle { reason: String },

    // === Infrastructure ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl RelayError {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::MissingTeam => StatusCode::BAD_REQUEST,
            Self::Unauthorized
            | Self::InvalidToken
            | Self::MissingSignature
            | Self::InvalidSignature
            | Self::BodyModified
            | Self::UnknownPeer { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::ServerNotTrusted { .. } | Self::ServerBlocked { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidBundle { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients and peers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::MissingTeam => "MISSING_TEAM",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::MissingSignature => "MISSING_SIGNATURE",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::BodyModified => "BODY_MODIFIED",
            Self::UnknownPeer { .. } => "UNKNOWN_PEER",
            Self::Forbidden => "FORBIDDEN",
            Self::ServerNotTrusted { .. } => "SERVER_NOT_TRUSTED",
            Self::ServerBlocked { .. } => "SERVER_BLOCKED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidBundle { .. } => "INVALID_BUNDLE",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            RelayError::Database(e) => {
                tracing::error!("Database error: {e}");
                "An internal error occurred".to_string()
            }
            RelayError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail { code: self.error_code(), message },
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(RelayError::MissingTeam.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::BodyModified.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RelayError::ServerNotTrusted { host: "b.example".into() }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RelayError::InvalidBundle { reason: "hash mismatch".into() }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn bundle_error_names_failing_check() {
        let e = RelayError::InvalidBundle { reason: "hash mismatch".into() };
        assert_eq!(e.to_string(), "Invalid bundle: hash mismatch");
        assert_eq!(e.error_code(), "INVALID_BUNDLE");
    }
}
