// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth client for Gmail read-only access.
//!
//! Handles:
//! - Authorization URL construction (offline access, forced consent)
//! - Authorization code exchange
//! - Gmail profile lookup for the account's email address

use crate::config::{Config, GMAIL_READONLY_SCOPE};
use crate::models::StoredCredentials;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PROFILE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/profile";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors talking to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("OAuth client is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// The identity provider side of the OAuth handshake.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization URL carrying `state`.
    fn authorization_url(&self, state: &str) -> Result<String, ProviderError>;

    /// Exchange an authorization code for credentials.
    async fn exchange_code(&self, code: &str) -> Result<StoredCredentials, ProviderError>;

    /// Email address of the account owning `access_token`.
    async fn fetch_email(&self, access_token: &str) -> Result<String, ProviderError>;
}

/// Google OAuth 2.0 client.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleOAuthClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri.clone(),
        })
    }

    fn check_configured(&self) -> Result<(), ProviderError> {
        if self.client_id.is_empty() {
            return Err(ProviderError::NotConfigured("client id"));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::NotConfigured("client secret"));
        }
        if self.redirect_uri.is_empty() {
            return Err(ProviderError::NotConfigured("redirect URI"));
        }
        Ok(())
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Http(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> Result<String, ProviderError> {
        self.check_configured()?;

        Ok(format!(
            "{}?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             include_granted_scopes=true&\
             prompt=consent&\
             state={}",
            AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(GMAIL_READONLY_SCOPE),
            urlencoding::encode(state),
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredCredentials, ProviderError> {
        self.check_configured()?;

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("Token request failed: {}", e)))?;

        let token: TokenResponse = Self::check_response_json(response).await?;

        tracing::info!(
            has_refresh_token = token.refresh_token.is_some(),
            "Exchanged authorization code"
        );

        Ok(token.into_credentials(&self.client_id, &self.client_secret))
    }

    async fn fetch_email(&self, access_token: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .get(PROFILE_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("Profile request failed: {}", e)))?;

        let profile: GmailProfile = Self::check_response_json(response).await?;
        Ok(profile.email_address)
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Credentials in the form stored per user.
    ///
    /// Falls back to the requested scope if Google did not echo one.
    pub fn into_credentials(self, client_id: &str, client_secret: &str) -> StoredCredentials {
        let scopes = match self.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => vec![GMAIL_READONLY_SCOPE.to_string()],
        };

        StoredCredentials {
            token: self.access_token,
            refresh_token: self.refresh_token,
            token_uri: TOKEN_URL.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes,
        }
    }
}

/// Gmail `users.getProfile` response (only the field we need).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailProfile {
    email_address: String,
}
