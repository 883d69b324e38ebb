//! Authentication domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header carrying the identity id to an out-of-process downstream.
pub const USER_ID_HEADER: &str = "x-medlock-user-id";
/// Header carrying the display name to an out-of-process downstream.
pub const USERNAME_HEADER: &str = "x-medlock-username";

/// Session record persisted under `session:{id}`.
///
/// Timestamps are stored as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySession {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Upstream OAuth access token.
    pub access_token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl IdentitySession {
    /// Whether the session has passed its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// The identity carried through to rate limiting and the downstream handler.
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            access_token: self.access_token.clone(),
        }
    }
}

/// Authenticated principal attached to a request as call-scoped metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub access_token: String,
}

/// User profile returned by the OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    pub id: String,
    pub login: Option<String>,
    pub email: Option<String>,
}

impl ProviderUser {
    /// Display name: login, else the local part of the email, else `"user"`.
    pub fn display_name(&self) -> String {
        if let Some(login) = self.login.as_deref().filter(|l| !l.is_empty()) {
            return login.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("user")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> IdentitySession {
        IdentitySession {
            user_id: "u1".into(),
            username: "octo".into(),
            email: None,
            access_token: "gho_x".into(),
            created_at: expires_at - chrono::Duration::hours(24),
            expires_at,
        }
    }

    #[test]
    fn serializes_with_camel_case_millis() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let json = serde_json::to_value(session(at)).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["expiresAt"], 1_700_000_000_123_i64);
        assert!(json.get("email").is_none());
    }

    #[test]
    fn expiry_is_strictly_after() {
        let now = Utc::now();
        assert!(!session(now).is_expired(now));
        assert!(session(now - chrono::Duration::milliseconds(1)).is_expired(now));
    }

    #[test]
    fn display_name_falls_back_to_email_then_user() {
        let mut user = ProviderUser {
            id: "1".into(),
            login: Some("octocat".into()),
            email: Some("cat@example.com".into()),
        };
        assert_eq!(user.display_name(), "octocat");
        user.login = None;
        assert_eq!(user.display_name(), "cat");
        user.email = None;
        assert_eq!(user.display_name(), "user");
    }
}
