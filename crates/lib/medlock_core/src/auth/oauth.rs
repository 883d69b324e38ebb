//! OAuth authorization-code flow (GitHub).
//!
//! Provides CSRF state management in the token store, plus the provider
//! abstraction used by the login and callback endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::kv::{self, KvError, KvStore};
use crate::models::auth::ProviderUser;

/// TTL for pending OAuth state entries (10 minutes).
pub const STATE_TTL: Duration = Duration::from_secs(600);

/// Key prefix for pending OAuth state.
pub const STATE_PREFIX: &str = "oauth_state:";

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_SCOPE: &str = "user:email";
const CLIENT_USER_AGENT: &str = "Medlock/1.0";

/// OAuth errors.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("User info fetch failed: {0}")]
    UserInfo(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("State store error: {0}")]
    Store(#[from] KvError),
}

// =============================================================================
// State parameter
// =============================================================================

/// Generate a cryptographic state parameter (CSRF token).
pub fn generate_state() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Serialize, Deserialize)]
struct PendingState {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

/// Pending OAuth states, single use, kept in the token store.
#[derive(Clone)]
pub struct OAuthStateStore {
    store: Arc<dyn KvStore>,
}

impl OAuthStateStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Mint and persist a new state parameter.
    pub async fn issue(&self) -> Result<String, KvError> {
        let state = generate_state();
        let pending = PendingState {
            timestamp: Utc::now(),
        };
        kv::put_json(
            self.store.as_ref(),
            &format!("{STATE_PREFIX}{state}"),
            &pending,
            Some(STATE_TTL),
        )
        .await?;
        Ok(state)
    }

    /// Take (remove and return) a state. Returns `false` if it was unknown
    /// or has expired.
    pub async fn consume(&self, state: &str) -> Result<bool, KvError> {
        let key = format!("{STATE_PREFIX}{state}");
        if self.store.get(&key).await?.is_none() {
            return Ok(false);
        }
        self.store.delete(&key).await?;
        Ok(true)
    }
}

// =============================================================================
// Provider
// =============================================================================

/// An OAuth identity provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is redirected to for consent.
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<Url, OAuthError>;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, OAuthError>;

    /// Fetch the profile of the token's owner.
    async fn user_info(&self, access_token: &str) -> Result<ProviderUser, OAuthError>;
}

/// Response from GitHub's token endpoint. Errors arrive as 200 with `error`.
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: serde_json::Value,
    login: Option<String>,
    email: Option<String>,
}

impl GitHubUser {
    fn into_provider_user(self) -> Result<ProviderUser, OAuthError> {
        let id = match self.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s,
            other => return Err(OAuthError::UserInfo(format!("unexpected user id: {other}"))),
        };
        Ok(ProviderUser {
            id,
            login: self.login,
            email: self.email,
        })
    }
}

/// GitHub OAuth app client.
#[derive(Debug, Clone)]
pub struct GitHubOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    authorize_endpoint: String,
    token_endpoint: String,
    user_endpoint: String,
}

impl GitHubOAuth {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_endpoint: GITHUB_AUTHORIZE_URL.to_string(),
            token_endpoint: GITHUB_TOKEN_URL.to_string(),
            user_endpoint: GITHUB_USER_URL.to_string(),
        }
    }

    /// Override the provider endpoints (GitHub Enterprise, test doubles).
    pub fn with_endpoints(
        mut self,
        authorize: impl Into<String>,
        token: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        self.authorize_endpoint = authorize.into();
        self.token_endpoint = token.into();
        self.user_endpoint = user.into();
        self
    }
}

#[async_trait]
impl OAuthProvider for GitHubOAuth {
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<Url, OAuthError> {
        let url = Url::parse_with_params(
            &self.authorize_endpoint,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", GITHUB_SCOPE),
                ("state", state),
            ],
        )?;
        Ok(url)
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, OAuthError> {
        let resp = self
            .http
            .post(&self.token_endpoint)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
                "redirect_uri": redirect_uri,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OAuthError::Exchange(format!("status {}", resp.status())));
        }

        let body: GitHubTokenResponse = resp.json().await?;
        match (body.access_token, body.error) {
            (Some(token), None) => {
                debug!("GitHub token exchange succeeded");
                Ok(token)
            }
            (_, Some(err)) => Err(OAuthError::Exchange(format!(
                "{err}: {}",
                body.error_description.unwrap_or_default()
            ))),
            (None, None) => Err(OAuthError::Exchange("no access_token in response".into())),
        }
    }

    async fn user_info(&self, access_token: &str) -> Result<ProviderUser, OAuthError> {
        let resp = self
            .http
            .get(&self.user_endpoint)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OAuthError::UserInfo(format!("status {}", resp.status())));
        }

        let user: GitHubUser = resp.json().await?;
        user.into_provider_user()
    }
}
