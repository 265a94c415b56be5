//! Application configuration loaded from environment variables.
//!
//! Google OAuth client settings may come from the environment or from a
//! Google client secrets file (`credentials.json`). They are not required at
//! startup; login fails with a configuration error until they are present.

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Gmail read-only scope requested at login.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID
    pub google_client_id: String,
    /// Registered OAuth redirect URI (points at `/oauth2callback`)
    pub oauth_redirect_uri: String,
    /// Frontend URL to land on after login
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Document store selection
    pub storage_backend: StorageBackend,
    /// Server port
    pub port: u16,

    // --- Report generation Lambda ---
    pub lambda_function_name: String,
    pub aws_region: String,
    /// Per-attempt read timeout for the Lambda invocation
    pub lambda_read_timeout: Duration,
    /// Transport-level attempts for the Lambda invocation
    pub lambda_max_attempts: u32,
    /// Overall deadline for one report request
    pub report_deadline: Duration,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Signing key for session tokens (raw bytes)
    pub session_signing_key: Vec<u8>,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            oauth_redirect_uri: "http://localhost:5000/oauth2callback".to_string(),
            frontend_url: "http://localhost:5000".to_string(),
            gcp_project_id: "test-project".to_string(),
            storage_backend: StorageBackend::Memory,
            port: 8080,
            lambda_function_name: "email-report-generator".to_string(),
            aws_region: "us-east-1".to_string(),
            lambda_read_timeout: Duration::from_secs(60),
            lambda_max_attempts: 3,
            report_deadline: Duration::from_secs(180),
            google_client_secret: "test_secret".to_string(),
            session_signing_key: b"test_session_key_32_bytes_min!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secrets_file = env::var("GOOGLE_CLIENT_SECRETS_FILE")
            .unwrap_or_else(|_| "credentials.json".to_string());
        let file_secrets = match ClientSecrets::load(Path::new(&secrets_file)) {
            Ok(secrets) => secrets,
            Err(e) => {
                tracing::debug!(path = %secrets_file, error = %e, "No usable client secrets file");
                None
            }
        };

        let google_client_id = env::var("GOOGLE_CLIENT_ID")
            .map(|v| v.trim().to_string())
            .ok()
            .or_else(|| file_secrets.as_ref().map(|s| s.client_id.clone()))
            .unwrap_or_default();
        let google_client_secret = env::var("GOOGLE_CLIENT_SECRET")
            .map(|v| v.trim().to_string())
            .ok()
            .or_else(|| file_secrets.as_ref().map(|s| s.client_secret.clone()))
            .unwrap_or_default();

        if google_client_id.is_empty() || google_client_secret.is_empty() {
            tracing::warn!("Google OAuth client is not configured; login will fail");
        }

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
        let oauth_redirect_uri = env::var("OAUTH_REDIRECT_URI")
            .unwrap_or_else(|_| format!("{}/oauth2callback", frontend_url.trim_end_matches('/')));

        let storage_backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("firestore") | Err(_) => StorageBackend::Firestore,
            Ok(_) => return Err(ConfigError::Invalid("STORAGE_BACKEND")),
        };

        Ok(Self {
            google_client_id,
            oauth_redirect_uri,
            frontend_url,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            storage_backend,
            port: parse_or("PORT", 8080),
            lambda_function_name: env::var("LAMBDA_FUNCTION_NAME")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("LAMBDA_FUNCTION_NAME"))?,
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            lambda_read_timeout: Duration::from_secs(parse_or("LAMBDA_READ_TIMEOUT_SECS", 60)),
            lambda_max_attempts: parse_or("LAMBDA_MAX_ATTEMPTS", 3),
            report_deadline: Duration::from_secs(parse_or("REPORT_DEADLINE_SECS", 180)),
            google_client_secret,
            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn is_local_frontend(&self) -> bool {
        self.frontend_url.starts_with("http://localhost")
            || self.frontend_url.starts_with("http://127.0.0.1")
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// OAuth client settings from a Google client secrets file.
#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
}

/// Google wraps the settings in `web` or `installed` depending on client type.
#[derive(Deserialize)]
struct ClientSecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

impl ClientSecrets {
    fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::SecretsFile(e.to_string()))?;
        Self::parse(&raw).map(Some)
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        let file: ClientSecretsFile =
            serde_json::from_str(raw).map_err(|e| ConfigError::SecretsFile(e.to_string()))?;
        file.web
            .or(file.installed)
            .ok_or_else(|| ConfigError::SecretsFile("missing 'web' or 'installed' key".to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Client secrets file error: {0}")]
    SecretsFile(String),
}
