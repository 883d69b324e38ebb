//! Authentication middleware: session cookie or bearer token.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::debug;

use medlock_core::auth::AuthError;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::SESSION_COOKIE;

/// Pick the session id from the request.
///
/// The cookie wins when both are present; the header is not consulted then.
pub fn credential(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Axum middleware: resolves the session and injects the caller's
/// [`Identity`](medlock_core::models::auth::Identity) and
/// [`IdentitySession`](medlock_core::models::auth::IdentitySession) into
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id =
        credential(&jar, request.headers()).ok_or(AppError::from(AuthError::Missing))?;

    let session = state.sessions.resolve(&session_id, Utc::now()).await?;
    debug!(user_id = %session.user_id, "authenticated");

    request.extensions_mut().insert(session.identity());
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
