//! OAuth login, callback and logout handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{LogoutResponse, OAuthCallbackParams};
use crate::services::auth;
use crate::services::cookies::{self, SESSION_COOKIE};

/// 302 Found to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `GET /auth/login`: redirect to the provider's consent page.
pub async fn login_handler(State(state): State<AppState>) -> AppResult<Response> {
    let url = auth::begin_login(&state).await?;
    Ok(found(url.as_str()))
}

/// `GET /auth/callback`: finish the OAuth exchange and set the session cookie.
pub async fn callback_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<OAuthCallbackParams>,
) -> AppResult<(CookieJar, Response)> {
    let (session_id, _) = auth::complete_login(&state, params).await?;
    let cookie = cookies::session_cookie(
        &session_id,
        state.sessions.ttl(),
        state.config.secure_cookies(),
    );
    Ok((jar.add(cookie), found(&state.config.success_url())))
}

/// `POST /auth/logout`: revoke the session, if any, and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutResponse>)> {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    auth::logout(&state, session_id.as_deref()).await?;
    let jar = jar.add(cookies::clear_session_cookie(state.config.secure_cookies()));
    Ok((
        jar,
        Json(LogoutResponse {
            message: "Logged out successfully".into(),
        }),
    ))
}
