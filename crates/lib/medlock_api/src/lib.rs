//! # medlock_api
//!
//! HTTP gateway library for Medlock.
//!
//! Every request to the MCP endpoint passes the session gateway, then the
//! per-identity rate limiter, then the session-sticky router, before it is
//! handed to the [`Downstream`](downstream::Downstream) MCP handler.

pub mod config;
pub mod downstream;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{any, get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use medlock_core::audit::AuditLog;
use medlock_core::auth::oauth::{OAuthProvider, OAuthStateStore};
use medlock_core::auth::session::SessionStore;
use medlock_core::kv::KvStore;
use medlock_core::ratelimit::AdmissionControl;
use medlock_core::routing::{MCP_SESSION_HEADER, SessionRouter};

use crate::config::GatewayConfig;
use crate::downstream::Downstream;
use crate::handlers::{auth, health, mcp};
use crate::middleware::rate_limit::{LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Route paths.
pub mod routes {
    pub const HEALTH: &str = "/health";
    pub const TEST_AUTH: &str = "/test-auth";
    pub const AUTH_LOGIN: &str = "/auth/login";
    pub const AUTH_CALLBACK: &str = "/auth/callback";
    pub const AUTH_LOGOUT: &str = "/auth/logout";
    pub const MCP: &str = "/api/mcp";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub sessions: SessionStore,
    pub limiter: Arc<dyn AdmissionControl>,
    pub session_router: SessionRouter,
    pub oauth: Arc<dyn OAuthProvider>,
    pub oauth_states: OAuthStateStore,
    pub audit: AuditLog,
    pub downstream: Arc<dyn Downstream>,
}

impl AppState {
    /// Wire the state from its backends.
    ///
    /// `tokens` holds sessions, OAuth states and session mappings; `audit`
    /// holds audit entries.
    pub fn new(
        config: GatewayConfig,
        tokens: Arc<dyn KvStore>,
        audit: Arc<dyn KvStore>,
        limiter: Arc<dyn AdmissionControl>,
        oauth: Arc<dyn OAuthProvider>,
        downstream: Arc<dyn Downstream>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(tokens.clone(), config.session_ttl),
            session_router: SessionRouter::new(tokens.clone(), config.mcp_session_ttl),
            oauth_states: OAuthStateStore::new(tokens),
            audit: AuditLog::new(audit),
            config,
            limiter,
            oauth,
            downstream,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let session_header = HeaderName::from_static(MCP_SESSION_HEADER);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, session_header.clone()])
        .expose_headers([session_header, LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER])
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route(routes::HEALTH, get(health::health))
        .route(routes::AUTH_LOGIN, get(auth::login_handler))
        .route(routes::AUTH_CALLBACK, get(auth::callback_handler))
        .route(routes::AUTH_LOGOUT, post(auth::logout_handler));

    let protected = Router::new()
        .route(routes::TEST_AUTH, get(health::test_auth))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Auth runs first, then the limiter keyed by the resolved identity.
    let api = Router::new()
        .route(routes::MCP, any(mcp::mcp_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ))
        .layer(cors_layer(&state.config.allowed_origins));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(api)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
