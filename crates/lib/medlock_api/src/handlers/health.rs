//! Liveness and auth probe endpoints.

use axum::Json;
use axum::extract::{Extension, State};
use chrono::{SecondsFormat, Utc};

use medlock_core::models::auth::Identity;

use crate::AppState;
use crate::models::{HealthResponse, TestAuthResponse};

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: state.config.mcp_version.clone(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `GET /test-auth`: echoes the authenticated identity.
pub async fn test_auth(Extension(identity): Extension<Identity>) -> Json<TestAuthResponse> {
    Json(TestAuthResponse {
        message: "Authenticated".into(),
        user_id: identity.user_id,
    })
}
