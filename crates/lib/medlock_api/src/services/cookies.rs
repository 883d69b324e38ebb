//! Session cookie helpers.

use std::time::Duration as StdDuration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "hc_session";

/// Build the httpOnly session cookie.
pub fn session_cookie(session_id: &str, max_age: StdDuration, secure: bool) -> Cookie<'static> {
    let max_age = Duration::try_from(max_age).unwrap_or(Duration::days(1));
    Cookie::build((SESSION_COOKIE.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(max_age)
        .build()
}

/// Build an expired cookie to clear the session.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
