//! Downstream MCP protocol handler.
//!
//! The gateway hands authenticated, rate-checked requests to a [`Downstream`].
//! [`LocalDownstream`] serves them from an in-process router, carrying the
//! caller's [`Identity`] in the request extensions. [`RemoteDownstream`]
//! proxies them over HTTP, carrying the identity in headers.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use thiserror::Error;
use tower::ServiceExt;
use tracing::debug;

use medlock_core::models::auth::{Identity, USER_ID_HEADER, USERNAME_HEADER};

#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("downstream request failed: {0}")]
    Transport(String),

    #[error("invalid downstream request: {0}")]
    InvalidRequest(String),
}

/// Handler that receives forwarded MCP traffic.
#[async_trait]
pub trait Downstream: Send + Sync {
    async fn forward(&self, request: Request) -> Result<Response, DownstreamError>;
}

/// In-process downstream backed by an Axum router.
#[derive(Clone)]
pub struct LocalDownstream {
    app: axum::Router,
}

impl LocalDownstream {
    pub fn new(app: axum::Router) -> Self {
        Self { app }
    }
}

#[async_trait]
impl Downstream for LocalDownstream {
    async fn forward(&self, request: Request) -> Result<Response, DownstreamError> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .map_err(|never| match never {})
    }
}

/// Request headers never passed to a remote downstream. Credentials stay at
/// the gateway; identity travels in the dedicated headers instead.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "cookie",
    "authorization",
    "transfer-encoding",
];

/// Response headers dropped when relaying; the body is re-streamed.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &["connection", "content-length", "transfer-encoding"];

/// HTTP proxy to an out-of-process MCP handler.
#[derive(Debug, Clone)]
pub struct RemoteDownstream {
    http: reqwest::Client,
    base_url: String,
    max_body_bytes: usize,
}

impl RemoteDownstream {
    pub fn new(base_url: impl Into<String>, max_body_bytes: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_body_bytes,
        }
    }

    fn outbound_headers(
        source: &HeaderMap,
        identity: Option<&Identity>,
    ) -> Result<HeaderMap, DownstreamError> {
        let mut headers = source.clone();
        for name in STRIPPED_REQUEST_HEADERS {
            headers.remove(*name);
        }
        headers.remove(USER_ID_HEADER);
        headers.remove(USERNAME_HEADER);
        if let Some(identity) = identity {
            let value = |v: &str| {
                HeaderValue::from_str(v)
                    .map_err(|e| DownstreamError::InvalidRequest(format!("identity header: {e}")))
            };
            headers.insert(USER_ID_HEADER, value(&identity.user_id)?);
            headers.insert(USERNAME_HEADER, value(&identity.username)?);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Downstream for RemoteDownstream {
    async fn forward(&self, request: Request) -> Result<Response, DownstreamError> {
        let (parts, body) = request.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let url = format!("{}{path}", self.base_url);

        let headers = Self::outbound_headers(&parts.headers, parts.extensions.get::<Identity>())?;
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| DownstreamError::InvalidRequest(format!("request body: {e}")))?;

        debug!(method = %parts.method, %url, "forwarding to remote downstream");
        let upstream = self
            .http
            .request(parts.method.clone(), &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| DownstreamError::Transport(e.to_string()))?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response_builder = axum::http::Response::builder().status(status);
        for (name, value) in upstream.headers() {
            if !STRIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                response_builder = response_builder.header(name, value);
            }
        }

        // SSE responses stay open; relay the body as it arrives.
        let body = Body::from_stream(upstream.bytes_stream());
        response_builder
            .body(body)
            .map_err(|e| DownstreamError::Transport(format!("response build failed: {e}")))
    }
}
