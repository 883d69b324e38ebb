//! OAuth login, callback and logout.

use chrono::Utc;
use tracing::{info, warn};
use url::Url;

use medlock_core::models::auth::IdentitySession;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::OAuthCallbackParams;

/// Issue an OAuth state and build the provider consent URL.
pub async fn begin_login(state: &AppState) -> AppResult<Url> {
    let oauth_state = state.oauth_states.issue().await?;
    let url = state
        .oauth
        .authorize_url(&oauth_state, &state.config.callback_url())?;
    Ok(url)
}

/// Validate the callback, exchange the code and open a session.
///
/// The state is consumed before the exchange, so a replayed callback fails
/// even if the first attempt did not complete.
pub async fn complete_login(
    state: &AppState,
    params: OAuthCallbackParams,
) -> AppResult<(String, IdentitySession)> {
    let (Some(code), Some(oauth_state)) = (
        params.code.filter(|c| !c.is_empty()),
        params.state.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::Validation("Missing code or state".into()));
    };

    if !state.oauth_states.consume(&oauth_state).await? {
        return Err(AppError::InvalidOAuthState);
    }

    let redirect_uri = state.config.callback_url();
    let access_token = state.oauth.exchange_code(&code, &redirect_uri).await?;
    let user = state.oauth.user_info(&access_token).await?;

    let (session_id, session) = state
        .sessions
        .create(&user, &access_token, Utc::now())
        .await
        .map_err(|e| AppError::AuthenticationFailed(format!("session create: {e}")))?;

    info!(user_id = %session.user_id, username = %session.username, "login");
    record(state, &session.user_id, "login", serde_json::json!({
        "username": session.username,
    }))
    .await;

    Ok((session_id, session))
}

/// Revoke the session named by the cookie, if any.
pub async fn logout(state: &AppState, session_id: Option<&str>) -> AppResult<()> {
    let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    let owner = state
        .sessions
        .resolve(session_id, Utc::now())
        .await
        .ok()
        .map(|s| s.user_id);

    state.sessions.revoke(session_id).await?;

    if let Some(user_id) = owner {
        info!(%user_id, "logout");
        record(state, &user_id, "logout", serde_json::json!({})).await;
    }
    Ok(())
}

async fn record(state: &AppState, user_id: &str, action: &str, details: serde_json::Value) {
    if let Err(e) = state.audit.record(user_id, action, details).await {
        warn!(%user_id, action, "failed to record audit entry: {e}");
    }
}
