//! Gateway configuration.

use std::time::Duration;

use medlock_core::auth::session::DEFAULT_SESSION_TTL;
use medlock_core::ratelimit::RateLimitConfig;
use medlock_core::routing::DEFAULT_MAPPING_TTL;

/// Upper bound on a buffered JSON-RPC body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Upper bound for configured TTLs: 10 years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

const DEFAULT_ORIGINS: &[&str] = &["https://medlock.ai", "https://chat.openai.com"];

/// Configuration for the gateway.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8787").
    pub bind_addr: String,
    /// Public base URL of this service; OAuth redirect and scan links hang off it.
    pub base_url: String,
    /// Where the browser lands after a successful login.
    pub app_url: String,
    /// Origins allowed by CORS on `/api/*`.
    pub allowed_origins: Vec<String>,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    /// Version reported by `/health`.
    pub mcp_version: String,
    /// PostgreSQL URL; `None` keeps the KV store in memory.
    pub database_url: Option<String>,
    /// Remote MCP handler; `None` serves MCP in-process.
    pub downstream_url: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub session_ttl: Duration,
    pub mcp_session_ttl: Duration,
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".into(),
            base_url: "http://localhost:8787".into(),
            app_url: "http://localhost:8787".into(),
            allowed_origins: DEFAULT_ORIGINS.iter().map(|s| s.to_string()).collect(),
            oauth_client_id: String::new(),
            oauth_client_secret: String::new(),
            mcp_version: "v0.1.0".into(),
            database_url: None,
            downstream_url: None,
            rate_limit: RateLimitConfig::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            mcp_session_ttl: DEFAULT_MAPPING_TTL,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl GatewayConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable               | Default                                          |
    /// |------------------------|--------------------------------------------------|
    /// | `BIND_ADDR`            | `127.0.0.1:8787`                                 |
    /// | `BASE_URL`             | `http://localhost:8787`                          |
    /// | `APP_URL`              | value of `BASE_URL`                              |
    /// | `ALLOWED_ORIGINS`      | `https://medlock.ai,https://chat.openai.com`     |
    /// | `OAUTH_CLIENT_ID`      | empty                                            |
    /// | `OAUTH_CLIENT_SECRET`  | empty                                            |
    /// | `MCP_VERSION`          | `v0.1.0`                                         |
    /// | `DATABASE_URL`         | unset (in-memory KV)                             |
    /// | `DOWNSTREAM_URL`       | unset (in-process MCP server)                    |
    /// | `RATE_LIMIT_MAX`       | `3`                                              |
    /// | `RATE_LIMIT_WINDOW_MS` | `1000`                                           |
    /// | `RATE_LIMIT_CAPACITY`  | `100000`                                         |
    /// | `SESSION_TTL_SECS`     | `86400`                                          |
    /// | `MCP_SESSION_TTL_SECS` | `604800`                                         |
    ///
    /// Unparseable numbers fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let num = |k: &str| var(k).and_then(|v| v.trim().parse::<u64>().ok());
        let ttl = |k: &str| num(k).map(|secs| Duration::from_secs(secs.min(MAX_TTL_SECS)));

        let base_url = var("BASE_URL").unwrap_or(defaults.base_url);
        let app_url = var("APP_URL").unwrap_or_else(|| base_url.clone());

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or(defaults.allowed_origins);

        let mut rate_limit = defaults.rate_limit;
        if let Some(max) = num("RATE_LIMIT_MAX").and_then(|n| u32::try_from(n).ok()) {
            rate_limit.max_requests = max;
        }
        if let Some(ms) = num("RATE_LIMIT_WINDOW_MS").and_then(|n| i64::try_from(n).ok()) {
            rate_limit.window = chrono::Duration::milliseconds(ms.max(1));
        }
        if let Some(cap) = num("RATE_LIMIT_CAPACITY").and_then(|n| usize::try_from(n).ok()) {
            rate_limit.capacity = cap.max(1);
        }

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            base_url,
            app_url,
            allowed_origins,
            oauth_client_id: var("OAUTH_CLIENT_ID").unwrap_or_default(),
            oauth_client_secret: var("OAUTH_CLIENT_SECRET").unwrap_or_default(),
            mcp_version: var("MCP_VERSION").unwrap_or(defaults.mcp_version),
            database_url: var("DATABASE_URL"),
            downstream_url: var("DOWNSTREAM_URL"),
            rate_limit,
            session_ttl: ttl("SESSION_TTL_SECS").unwrap_or(defaults.session_ttl),
            mcp_session_ttl: ttl("MCP_SESSION_TTL_SECS").unwrap_or(defaults.mcp_session_ttl),
            max_body_bytes: defaults.max_body_bytes,
        }
    }

    /// OAuth redirect URI registered with the provider.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.base_url.trim_end_matches('/'))
    }

    /// Post-login landing page.
    pub fn success_url(&self) -> String {
        format!("{}/auth/success", self.app_url.trim_end_matches('/'))
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
