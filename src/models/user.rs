//! User credential model for storage and API.

use serde::{Deserialize, Serialize};

/// Stored user record, keyed by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    /// Gmail address (also used as document ID)
    pub email: String,
    /// OAuth credentials, overwritten on every login
    pub credentials: StoredCredentials,
    /// When the user first connected
    pub created_at: String,
    /// When the credentials were last replaced
    pub updated_at: String,
    /// Last successful report generation
    #[serde(default)]
    pub last_sync: Option<String>,
}

/// Google OAuth credentials in the shape the report function consumes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Access token
    pub token: String,
    /// Refresh token (Google omits it on some re-consents)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token endpoint used for refreshes
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}
