//! Rate limit middleware.
//!
//! Runs after authentication and keys the limiter by identity id. Every
//! decision is reported in `X-RateLimit-*` headers. A limiter failure lets
//! the request through without headers.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use medlock_core::models::auth::Identity;
use medlock_core::ratelimit::Decision;

use crate::AppState;
use crate::error::AppError;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(decision.reset_epoch_secs()));
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(identity) = request.extensions().get::<Identity>().map(|i| i.user_id.clone()) else {
        return AppError::Internal("rate limit reached without identity".into()).into_response();
    };

    match state.limiter.admit(&identity, Utc::now()).await {
        Ok(decision) => {
            let mut response = if decision.allowed {
                next.run(request).await
            } else {
                debug!(%identity, reset = decision.reset_epoch_secs(), "rate limited");
                AppError::RateLimitExceeded.into_response()
            };
            apply_headers(response.headers_mut(), &decision);
            response
        }
        Err(e) => {
            warn!(%identity, "rate limiter unavailable, admitting request: {e}");
            next.run(request).await
        }
    }
}
