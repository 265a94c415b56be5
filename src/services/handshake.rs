// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login handshake.
//!
//! `initiate` issues a single-use state and the provider URL; `complete`
//! redeems the state, exchanges the code, stores credentials and opens a
//! session. A redeemed state is gone even if a later step fails, so a
//! failed callback cannot be replayed and the user must log in again.

use crate::db::Database;
use crate::models::OAuthState;
use crate::services::google_oauth::{IdentityProvider, ProviderError};
use crate::services::session::{random_token, SessionStore};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// Handshake failures, one per user-visible outcome.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("No state parameter received")]
    MissingState,

    #[error("Invalid or expired state")]
    InvalidOrExpiredState,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Profile lookup failed: {0}")]
    ProfileLookupFailed(String),

    #[error("OAuth configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandshakeError {
    /// Stable identifier used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            HandshakeError::MissingState => "MissingState",
            HandshakeError::InvalidOrExpiredState => "InvalidOrExpiredState",
            HandshakeError::TokenExchangeFailed(_) => "TokenExchangeFailed",
            HandshakeError::ProfileLookupFailed(_) => "ProfileLookupFailed",
            HandshakeError::Configuration(_) => "Configuration",
            HandshakeError::Internal(_) => "Server",
        }
    }

    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            HandshakeError::MissingState => "No state parameter received".to_string(),
            HandshakeError::InvalidOrExpiredState => {
                "Invalid or expired state. Please try logging in again.".to_string()
            }
            HandshakeError::Internal(_) => "Authentication failed".to_string(),
            other => format!("Authentication failed: {}", other),
        }
    }
}

/// Query parameters on the provider's redirect back to us.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Set by the provider when the user denied consent
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of a successful handshake.
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub email: String,
    pub session_token: String,
}

/// Orchestrates the OAuth exchange.
#[derive(Clone)]
pub struct AuthHandshake {
    db: Arc<dyn Database>,
    provider: Arc<dyn IdentityProvider>,
    sessions: Arc<SessionStore>,
}

impl AuthHandshake {
    pub fn new(
        db: Arc<dyn Database>,
        provider: Arc<dyn IdentityProvider>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            db,
            provider,
            sessions,
        }
    }

    /// Issue a state and return the provider authorization URL.
    ///
    /// Nothing is stored if the URL cannot be built.
    pub async fn initiate(&self) -> Result<String, HandshakeError> {
        let state = random_token().map_err(|e| HandshakeError::Internal(e.to_string()))?;

        let auth_url = self
            .provider
            .authorization_url(&state)
            .map_err(|e| HandshakeError::Configuration(e.to_string()))?;

        self.db
            .insert_state(&OAuthState::issue(state, Utc::now()))
            .await
            .map_err(|e| HandshakeError::Internal(e.to_string()))?;

        tracing::info!("Starting OAuth flow, issued state");
        Ok(auth_url)
    }

    /// Redeem the callback and log the user in.
    pub async fn complete(&self, params: CallbackParams) -> Result<CompletedLogin, HandshakeError> {
        let state = params
            .state
            .filter(|s| !s.is_empty())
            .ok_or(HandshakeError::MissingState)?;

        if !is_well_formed_state(&state) {
            tracing::warn!("Rejected malformed OAuth state");
            return Err(HandshakeError::InvalidOrExpiredState);
        }

        let consumed = self
            .db
            .consume_state(&state, Utc::now())
            .await
            .map_err(|e| HandshakeError::Internal(e.to_string()))?;

        if consumed.is_none() {
            tracing::warn!("OAuth state not found or expired");
            return Err(HandshakeError::InvalidOrExpiredState);
        }

        // From here on the state is spent.

        if let Some(error) = params.error {
            tracing::warn!(error = %error, "OAuth error from provider");
            return Err(HandshakeError::TokenExchangeFailed(format!(
                "provider returned '{}'",
                error
            )));
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                HandshakeError::TokenExchangeFailed("missing authorization code".to_string())
            })?;

        let credentials = self
            .provider
            .exchange_code(&code)
            .await
            .map_err(|e| match e {
                ProviderError::NotConfigured(_) => HandshakeError::Configuration(e.to_string()),
                _ => HandshakeError::TokenExchangeFailed(e.to_string()),
            })?;

        let email = self
            .provider
            .fetch_email(&credentials.token)
            .await
            .map_err(|e| HandshakeError::ProfileLookupFailed(e.to_string()))?;

        self.db
            .upsert_credentials(&email, &credentials, Utc::now())
            .await
            .map_err(|e| HandshakeError::Internal(e.to_string()))?;

        let session_token = self
            .sessions
            .establish(&email)
            .map_err(|e| HandshakeError::Internal(e.to_string()))?;

        tracing::info!(email = %email, "Successfully authenticated");

        Ok(CompletedLogin {
            email,
            session_token,
        })
    }
}

/// Issued states are URL-safe base64; anything else cannot be ours.
fn is_well_formed_state(state: &str) -> bool {
    (16..=128).contains(&state.len())
        && state
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
