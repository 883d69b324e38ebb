//! Integration tests: drive the full router in-process against a fake
//! downstream MCP handler and a fake OAuth provider.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use medlock_api::config::GatewayConfig;
use medlock_api::downstream::{Downstream, DownstreamError};
use medlock_api::{AppState, router};
use medlock_core::audit::AUDIT_PREFIX;
use medlock_core::auth::oauth::{OAuthError, OAuthProvider};
use medlock_core::kv::{self, KvStore, MemoryKvStore};
use medlock_core::models::audit::AuditEntry;
use medlock_core::models::auth::{Identity, IdentitySession, ProviderUser};
use medlock_core::ratelimit::{
    AdmissionControl, Decision, RateLimitConfig, RateLimitError, RateLimiter,
};
use medlock_core::routing::{DEFAULT_MAPPING_TTL, SessionRouter};

// =============================================================================
// Fakes
// =============================================================================

/// What the downstream saw for one forwarded request.
#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    session: Option<String>,
    user: Option<String>,
    body: Vec<u8>,
}

/// Minimal stateful MCP handler: `initialize` mints `sess-N`; other JSON
/// messages need a known session id or get 404; unparseable JSON gets 400.
#[derive(Default)]
struct FakeDownstream {
    seen: Mutex<Vec<Seen>>,
    sessions: Mutex<Vec<String>>,
}

impl FakeDownstream {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downstream for FakeDownstream {
    async fn forward(&self, request: Request<Body>) -> Result<Response, DownstreamError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec();
        let session = parts
            .headers
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().unwrap().push(Seen {
            method: parts.method.clone(),
            session: session.clone(),
            user: parts.extensions.get::<Identity>().map(|i| i.user_id.clone()),
            body: body.clone(),
        });

        let parsed = serde_json::from_slice::<Value>(&body);
        let response = match parsed {
            Err(_) if parts.method == Method::POST => axum::http::Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::from("parse error")),
            Ok(msg) if msg["method"] == "initialize" => {
                let mut sessions = self.sessions.lock().unwrap();
                let id = format!("sess-{}", sessions.len() + 1);
                sessions.push(id.clone());
                axum::http::Response::builder()
                    .status(StatusCode::OK)
                    .header("mcp-session-id", id)
                    .body(Body::from(r#"{"jsonrpc":"2.0","result":{},"id":1}"#))
            }
            _ => {
                let known = session
                    .as_ref()
                    .is_some_and(|s| self.sessions.lock().unwrap().contains(s));
                let status = if known {
                    StatusCode::OK
                } else {
                    StatusCode::NOT_FOUND
                };
                axum::http::Response::builder().status(status).body(Body::from("{}"))
            }
        };
        Ok(response.unwrap())
    }
}

/// Re-pins the identity to `fresh` while a continuation is in flight, as a
/// concurrent `initialize` would, then reports the session as gone.
struct RacingDownstream {
    router: SessionRouter,
    identity: String,
}

#[async_trait]
impl Downstream for RacingDownstream {
    async fn forward(&self, _request: Request<Body>) -> Result<Response, DownstreamError> {
        self.router.record(&self.identity, "fresh").await.unwrap();
        Ok(axum::http::Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("{}"))
            .unwrap())
    }
}

struct FakeOAuth;

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<Url, OAuthError> {
        Ok(Url::parse_with_params(
            "https://provider.example/authorize",
            &[("state", state), ("redirect_uri", redirect_uri)],
        )?)
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<String, OAuthError> {
        if code == "good" {
            Ok("gho_fake".into())
        } else {
            Err(OAuthError::Exchange("bad_verification_code".into()))
        }
    }

    async fn user_info(&self, _access_token: &str) -> Result<ProviderUser, OAuthError> {
        Ok(ProviderUser {
            id: "9001".into(),
            login: Some("octocat".into()),
            email: Some("octo@example.com".into()),
        })
    }
}

struct FailingLimiter;

#[async_trait]
impl AdmissionControl for FailingLimiter {
    async fn admit(&self, _identity: &str, _now: DateTime<Utc>) -> Result<Decision, RateLimitError> {
        Err(RateLimitError::Unavailable("backend offline".into()))
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    app: Router,
    state: AppState,
    tokens: Arc<MemoryKvStore>,
    audit: Arc<MemoryKvStore>,
    downstream: Arc<FakeDownstream>,
}

fn test_config() -> GatewayConfig {
    GatewayConfig {
        base_url: "http://localhost:8787".into(),
        app_url: "https://medlock.ai".into(),
        allowed_origins: vec!["https://medlock.ai".into()],
        ..GatewayConfig::default()
    }
}

fn limiter(max_requests: u32) -> Arc<dyn AdmissionControl> {
    // A long window keeps results independent of test timing.
    Arc::new(RateLimiter::new(RateLimitConfig {
        max_requests,
        window: chrono::Duration::seconds(60),
        ..RateLimitConfig::default()
    }))
}

fn harness_with(limiter: Arc<dyn AdmissionControl>) -> Harness {
    let tokens = Arc::new(MemoryKvStore::new());
    let audit = Arc::new(MemoryKvStore::new());
    let downstream = Arc::new(FakeDownstream::default());
    let state = AppState::new(
        test_config(),
        tokens.clone(),
        audit.clone(),
        limiter,
        Arc::new(FakeOAuth),
        downstream.clone(),
    );
    Harness {
        app: router(state.clone()),
        state,
        tokens,
        audit,
        downstream,
    }
}

fn harness() -> Harness {
    harness_with(limiter(100))
}

impl Harness {
    async fn audit_entries(&self) -> Vec<AuditEntry> {
        let mut entries = Vec::new();
        for key in self.audit.list(AUDIT_PREFIX).await.unwrap() {
            entries.extend(kv::get_json::<AuditEntry>(self.audit.as_ref(), &key).await.unwrap());
        }
        entries
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.expect("request")
    }

    async fn session_for(&self, user_id: &str) -> String {
        let user = ProviderUser {
            id: user_id.into(),
            login: Some(format!("{user_id}-login")),
            email: None,
        };
        let (id, _) = self
            .state
            .sessions
            .create(&user, "gho_token", Utc::now())
            .await
            .unwrap();
        id
    }
}

fn rpc(session: &str, method: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/mcp")
        .header("cookie", format!("hc_session={session}"))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"jsonrpc": "2.0", "method": method, "params": {}, "id": 1}).to_string(),
        ))
        .unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

fn header(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn health_reports_version_and_security_headers() {
    let h = harness();
    let resp = h
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-frame-options").as_deref(), Some("DENY"));
    assert_eq!(header(&resp, "x-content-type-options").as_deref(), Some("nosniff"));
    assert_eq!(header(&resp, "x-xss-protection").as_deref(), Some("1; mode=block"));
    assert_eq!(
        header(&resp, "referrer-policy").as_deref(),
        Some("strict-origin-when-cross-origin")
    );

    let json = json_body(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], "v0.1.0");
    assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let h = harness();
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/mcp")
        .header("origin", "https://medlock.ai")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,mcp-session-id")
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;

    assert!(resp.status().is_success());
    assert_eq!(
        header(&resp, "access-control-allow-origin").as_deref(),
        Some("https://medlock.ai")
    );
    assert_eq!(
        header(&resp, "access-control-allow-credentials").as_deref(),
        Some("true")
    );
    assert!(h.downstream.seen().is_empty());
}

// =============================================================================
// Session gateway
// =============================================================================

#[tokio::test]
async fn missing_credential_is_rejected() {
    let h = harness();
    let req = Request::builder()
        .method("POST")
        .uri("/api/mcp")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = h.send(req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(resp).await;
    assert_eq!(json["error"], "authentication_missing");
    assert_eq!(json["message"], "Unauthorized");
    assert!(h.downstream.seen().is_empty());
}

#[tokio::test]
async fn unknown_bearer_is_invalid() {
    let h = harness();
    let req = Request::get("/test-auth")
        .header("authorization", "Bearer does-not-exist")
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "authentication_invalid");
}

#[tokio::test]
async fn expired_session_is_rejected_and_deleted() {
    let h = harness();
    let now = Utc::now();
    let expired = IdentitySession {
        user_id: "u-expired".into(),
        username: "old".into(),
        email: None,
        access_token: "t".into(),
        created_at: now - chrono::Duration::hours(25),
        expires_at: now - chrono::Duration::hours(1),
    };
    h.state.sessions.insert("stale", &expired).await.unwrap();

    let resp = h.send(rpc("stale", "tools/list")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(resp).await;
    assert_eq!(json["error"], "authentication_expired");
    assert_eq!(json["message"], "Session expired");

    assert!(h.tokens.get("session:stale").await.unwrap().is_none());
}

#[tokio::test]
async fn bearer_token_authenticates() {
    let h = harness();
    let session = h.session_for("12345").await;
    let req = Request::get("/test-auth")
        .header("authorization", format!("Bearer {session}"))
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["message"], "Authenticated");
    assert_eq!(json["userId"], "12345");
}

#[tokio::test]
async fn cookie_wins_over_bearer() {
    let h = harness();
    let good = h.session_for("cookie-user").await;
    let req = Request::get("/test-auth")
        .header("cookie", format!("hc_session={good}"))
        .header("authorization", "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(json_body(resp).await["userId"], "cookie-user");

    // A bad cookie is not rescued by a good bearer token.
    let req = Request::get("/test-auth")
        .header("cookie", "hc_session=garbage")
        .header("authorization", format!("Bearer {good}"))
        .body(Body::empty())
        .unwrap();
    let resp = h.send(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "authentication_invalid");
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn fourth_and_fifth_requests_are_limited() {
    let h = harness_with(limiter(3));
    let session = h.session_for("rl-user").await;

    let mut statuses = Vec::new();
    let mut remaining = Vec::new();
    for _ in 0..5 {
        let resp = h.send(rpc(&session, "initialize")).await;
        assert_eq!(header(&resp, "x-ratelimit-limit").as_deref(), Some("3"));
        assert!(header(&resp, "x-ratelimit-reset").is_some());
        statuses.push(resp.status().as_u16());
        remaining.push(header(&resp, "x-ratelimit-remaining").unwrap());
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let json = json_body(resp).await;
            assert_eq!(json["error"], "rate_limit_exceeded");
            assert_eq!(json["message"], "Rate limit exceeded");
        }
    }

    assert_eq!(statuses, vec![200, 200, 200, 429, 429]);
    assert_eq!(remaining, vec!["2", "1", "0", "0", "0"]);
    assert_eq!(h.downstream.seen().len(), 3);
}

#[tokio::test]
async fn users_have_separate_limits() {
    let h = harness_with(limiter(3));
    let a = h.session_for("user-a").await;
    let b = h.session_for("user-b").await;

    for _ in 0..3 {
        h.send(rpc(&a, "initialize")).await;
    }
    assert_eq!(
        h.send(rpc(&a, "initialize")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let resp = h.send(rpc(&b, "initialize")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-ratelimit-remaining").as_deref(), Some("2"));
}

#[tokio::test]
async fn limiter_failure_fails_open_without_headers() {
    let h = harness_with(Arc::new(FailingLimiter));
    let session = h.session_for("open-user").await;

    let resp = h.send(rpc(&session, "initialize")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header(&resp, "x-ratelimit-limit").is_none());
    assert!(header(&resp, "x-ratelimit-remaining").is_none());
    assert_eq!(h.downstream.seen().len(), 1);
}

#[tokio::test]
async fn unauthenticated_requests_do_not_consume_quota() {
    let h = harness_with(limiter(1));
    for _ in 0..3 {
        let resp = h.send(rpc("nobody", "initialize")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let session = h.session_for("fresh").await;
    assert_eq!(h.send(rpc(&session, "initialize")).await.status(), StatusCode::OK);
}

// =============================================================================
// Session-sticky routing
// =============================================================================

#[tokio::test]
async fn initialize_then_continuation_is_pinned() {
    let h = harness();
    let session = h.session_for("12345").await;

    // A stale client-supplied id must not reach the downstream on initialize.
    let mut init = rpc(&session, "initialize");
    init.headers_mut()
        .insert("mcp-session-id", "client-stale".parse().unwrap());
    let resp = h.send(init).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "mcp-session-id").as_deref(), Some("sess-1"));

    assert_eq!(
        h.tokens.get("mcp-session:12345").await.unwrap().as_deref(),
        Some("sess-1")
    );

    let resp = h.send(rpc(&session, "tools/list")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let seen = h.downstream.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].session, None);
    assert_eq!(seen[1].session.as_deref(), Some("sess-1"));
    assert!(seen.iter().all(|s| s.user.as_deref() == Some("12345")));
}

#[tokio::test]
async fn continuation_without_mapping_uses_fallback_and_reports_not_found() {
    let h = harness();
    let session = h.session_for("12345").await;

    let resp = h.send(rpc(&session, "tools/list")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"], "downstream_session_not_found");

    let seen = h.downstream.seen();
    assert_eq!(seen[0].session.as_deref(), Some("user-12345"));
}

#[tokio::test]
async fn stale_mapping_is_invalidated_on_not_found() {
    let h = harness();
    let session = h.session_for("12345").await;
    h.tokens
        .put("mcp-session:12345", "gone", None)
        .await
        .unwrap();

    let resp = h.send(rpc(&session, "tools/call")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.downstream.seen()[0].session.as_deref(), Some("gone"));
    assert!(h.tokens.get("mcp-session:12345").await.unwrap().is_none());

    // Re-initializing restores a working mapping.
    h.send(rpc(&session, "initialize")).await;
    assert_eq!(
        h.send(rpc(&session, "tools/list")).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn not_found_keeps_mapping_written_by_concurrent_initialize() {
    let tokens = Arc::new(MemoryKvStore::new());
    let downstream = Arc::new(RacingDownstream {
        router: SessionRouter::new(tokens.clone(), DEFAULT_MAPPING_TTL),
        identity: "12345".into(),
    });
    let state = AppState::new(
        test_config(),
        tokens.clone(),
        Arc::new(MemoryKvStore::new()),
        limiter(100),
        Arc::new(FakeOAuth),
        downstream,
    );
    let h = Harness {
        app: router(state.clone()),
        state,
        tokens: tokens.clone(),
        audit: Arc::new(MemoryKvStore::new()),
        downstream: Arc::new(FakeDownstream::default()),
    };
    let session = h.session_for("12345").await;

    // Stale stored mapping.
    tokens.put("mcp-session:12345", "gone", None).await.unwrap();
    let resp = h.send(rpc(&session, "tools/list")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        tokens.get("mcp-session:12345").await.unwrap().as_deref(),
        Some("fresh")
    );

    // No mapping at all: the fallback id is never invalidated.
    tokens.delete("mcp-session:12345").await.unwrap();
    let resp = h.send(rpc(&session, "tools/list")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        tokens.get("mcp-session:12345").await.unwrap().as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn reinitialize_replaces_mapping() {
    let h = harness();
    let session = h.session_for("12345").await;
    h.send(rpc(&session, "initialize")).await;
    h.send(rpc(&session, "initialize")).await;
    assert_eq!(
        h.tokens.get("mcp-session:12345").await.unwrap().as_deref(),
        Some("sess-2")
    );
}

#[tokio::test]
async fn unparseable_body_is_forwarded_untouched() {
    let h = harness();
    let session = h.session_for("12345").await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/mcp")
        .header("cookie", format!("hc_session={session}"))
        .header("content-type", "application/json")
        .header("mcp-session-id", "client-chosen")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = h.send(req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let seen = h.downstream.seen();
    assert_eq!(seen[0].session.as_deref(), Some("client-chosen"));
    assert_eq!(seen[0].body, b"{not json");
    assert!(h.tokens.get("mcp-session:12345").await.unwrap().is_none());
}

#[tokio::test]
async fn non_post_requests_pass_through() {
    let h = harness();
    let session = h.session_for("12345").await;
    let req = Request::get("/api/mcp")
        .header("cookie", format!("hc_session={session}"))
        .header("accept", "text/event-stream")
        .header("mcp-session-id", "sess-x")
        .body(Body::empty())
        .unwrap();
    h.send(req).await;

    let seen = h.downstream.seen();
    assert_eq!(seen[0].method, Method::GET);
    assert_eq!(seen[0].session.as_deref(), Some("sess-x"));
}

// =============================================================================
// OAuth lifecycle
// =============================================================================

async fn begin_login(h: &Harness) -> String {
    let resp = h
        .send(Request::get("/auth/login").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = Url::parse(&header(&resp, "location").unwrap()).unwrap();
    let redirect = location
        .query_pairs()
        .find(|(k, _)| k == "redirect_uri")
        .map(|(_, v)| v.into_owned());
    assert_eq!(redirect.as_deref(), Some("http://localhost:8787/auth/callback"));
    location
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state param")
}

#[tokio::test]
async fn oauth_callback_creates_session_and_rejects_replay() {
    let h = harness();
    let state = begin_login(&h).await;
    assert!(h.tokens.get(&format!("oauth_state:{state}")).await.unwrap().is_some());

    let uri = format!("/auth/callback?code=good&state={state}");
    let resp = h
        .send(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        header(&resp, "location").as_deref(),
        Some("https://medlock.ai/auth/success")
    );

    let cookie = header(&resp, "set-cookie").expect("session cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=86400"));
    let session_id = cookie
        .strip_prefix("hc_session=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_string();

    let resp = h
        .send(
            Request::get("/test-auth")
                .header("cookie", format!("hc_session={session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(json_body(resp).await["userId"], "9001");

    let audit = h.audit_entries().await;
    assert!(audit.iter().any(|e| e.action == "login" && e.user_id == "9001"));

    // Replay of the same state is refused.
    let resp = h
        .send(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "invalid_oauth_state");
}

#[tokio::test]
async fn oauth_callback_errors() {
    let h = harness();

    let resp = h
        .send(Request::get("/auth/callback?code=good").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "validation_error");

    let resp = h
        .send(
            Request::get("/auth/callback?code=good&state=forged")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "invalid_oauth_state");

    let state = begin_login(&h).await;
    let uri = format!("/auth/callback?code=bad&state={state}");
    let resp = h
        .send(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["error"], "authentication_failed");
}

#[tokio::test]
async fn logout_revokes_session_and_clears_cookie() {
    let h = harness();
    let session = h.session_for("12345").await;

    let resp = h
        .send(
            Request::post("/auth/logout")
                .header("cookie", format!("hc_session={session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = header(&resp, "set-cookie").unwrap();
    assert!(cookie.starts_with("hc_session=;"));
    assert!(cookie.contains("Max-Age=0"));
    assert_eq!(json_body(resp).await["message"], "Logged out successfully");

    assert!(h.tokens.get(&format!("session:{session}")).await.unwrap().is_none());
    let audit = h.audit_entries().await;
    assert!(audit.iter().any(|e| e.action == "logout" && e.user_id == "12345"));

    let resp = h.send(rpc(&session, "tools/list")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_without_cookie_still_succeeds() {
    let h = harness();
    let resp = h
        .send(Request::post("/auth/logout").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}
