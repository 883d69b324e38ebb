//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use medlock_core::auth::AuthError;
use medlock_core::auth::oauth::OAuthError;
use medlock_core::kv::KvError;

use crate::downstream::DownstreamError;
use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status and classification mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    AuthenticationMissing,

    #[error("Invalid session")]
    AuthenticationInvalid,

    #[error("Session expired")]
    AuthenticationExpired,

    #[error("Session store unavailable: {0}")]
    AuthenticationUnavailable(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Downstream session not found")]
    DownstreamSessionNotFound,

    #[error("Downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state")]
    InvalidOAuthState,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Status code and stable classification.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::AuthenticationMissing => (StatusCode::UNAUTHORIZED, "authentication_missing"),
            AppError::AuthenticationInvalid => (StatusCode::UNAUTHORIZED, "authentication_invalid"),
            AppError::AuthenticationExpired => (StatusCode::UNAUTHORIZED, "authentication_expired"),
            AppError::AuthenticationUnavailable(_) => {
                (StatusCode::UNAUTHORIZED, "authentication_unavailable")
            }
            AppError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded"),
            AppError::DownstreamSessionNotFound => {
                (StatusCode::NOT_FOUND, "downstream_session_not_found")
            }
            AppError::DownstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "downstream_unavailable"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::InvalidOAuthState => (StatusCode::BAD_REQUEST, "invalid_oauth_state"),
            AppError::AuthenticationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "authentication_failed")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Client-facing message. Infrastructure detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::AuthenticationUnavailable(_) => "Session store unavailable".into(),
            AppError::DownstreamUnavailable(_) => "Downstream unavailable".into(),
            AppError::Validation(m) => m.clone(),
            AppError::AuthenticationFailed(_) => "Authentication failed".into(),
            AppError::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        if status.is_server_error() || matches!(self, AppError::AuthenticationUnavailable(_)) {
            error!(error = kind, "{self}");
        }
        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message: self.public_message(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Missing => AppError::AuthenticationMissing,
            AuthError::Invalid => AppError::AuthenticationInvalid,
            AuthError::Expired => AppError::AuthenticationExpired,
            AuthError::StoreUnavailable(e) => AppError::AuthenticationUnavailable(e.to_string()),
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        AppError::AuthenticationFailed(e.to_string())
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<DownstreamError> for AppError {
    fn from(e: DownstreamError) -> Self {
        AppError::DownstreamUnavailable(e.to_string())
    }
}
