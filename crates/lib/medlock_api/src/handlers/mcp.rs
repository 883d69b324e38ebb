//! Session-sticky forwarding of MCP traffic.
//!
//! JSON-RPC `POST`s are classified so that `initialize` always reaches a fresh
//! downstream session and every other message is pinned to the identity's
//! mapped session. Everything else (SSE `GET`s, `DELETE`, unparseable bodies)
//! is forwarded untouched.

use axum::body::Body;
use axum::extract::{Extension, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
use axum::response::Response;
use tracing::{debug, warn};

use medlock_core::models::auth::Identity;
use medlock_core::routing::{
    MCP_SESSION_HEADER, MessageKind, SessionBinding, classify, fallback_session_id,
};

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Whether a downstream status means the addressed session does not exist.
///
/// The downstream performs no auth of its own, and the MCP transport answers
/// an unknown `mcp-session-id` with 401 rather than 404.
fn session_gone(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::UNAUTHORIZED
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
}

/// `ANY /api/mcp`
pub async fn mcp_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    request: Request,
) -> AppResult<Response> {
    let (mut parts, body) = request.into_parts();

    if parts.method != Method::POST || !is_json(&parts.headers) {
        let response = state
            .downstream
            .forward(Request::from_parts(parts, body))
            .await?;
        return Ok(response);
    }

    let bytes = axum::body::to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|e| AppError::Validation(format!("Unreadable request body: {e}")))?;

    let kind = classify(&bytes);
    if kind == MessageKind::Unparsed {
        debug!(user_id = %identity.user_id, "forwarding unparseable body as-is");
        let response = state
            .downstream
            .forward(Request::from_parts(parts, Body::from(bytes)))
            .await?;
        return Ok(response);
    }

    let binding = match state.session_router.bind(&identity.user_id, kind).await {
        Ok(binding) => binding,
        Err(e) => {
            warn!(user_id = %identity.user_id, "session mapping lookup failed, using fallback: {e}");
            SessionBinding::Fallback(fallback_session_id(&identity.user_id))
        }
    };

    match binding.header_value() {
        None => {
            parts.headers.remove(MCP_SESSION_HEADER);
        }
        Some(id) => {
            let value = HeaderValue::from_str(id)
                .map_err(|e| AppError::Internal(format!("session id header: {e}")))?;
            parts.headers.insert(MCP_SESSION_HEADER, value);
        }
    }
    debug!(user_id = %identity.user_id, ?kind, ?binding, "forwarding JSON-RPC message");

    let response = state
        .downstream
        .forward(Request::from_parts(parts, Body::from(bytes)))
        .await?;

    match kind {
        MessageKind::Initialize => {
            let minted = response
                .headers()
                .get(MCP_SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if response.status().is_success()
                && let Some(id) = minted
                && let Err(e) = state.session_router.record(&identity.user_id, &id).await
            {
                warn!(user_id = %identity.user_id, "failed to persist session mapping: {e}");
            }
        }
        MessageKind::Continuation if session_gone(response.status()) => {
            // Only a stored mapping can be stale; the fallback id never is.
            if let SessionBinding::Mapped(stale) = &binding
                && let Err(e) = state.session_router.invalidate(&identity.user_id, stale).await
            {
                warn!(user_id = %identity.user_id, "failed to invalidate session mapping: {e}");
            }
            return Err(AppError::DownstreamSessionNotFound);
        }
        _ => {}
    }

    Ok(response)
}
