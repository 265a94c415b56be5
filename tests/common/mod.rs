// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use email_reports::config::Config;
use email_reports::db::{CredentialStore, FirestoreDb, MemoryDb};
use email_reports::models::StoredCredentials;
use email_reports::routes::create_router;
use email_reports::services::{
    ComputeBackend, ComputeError, IdentityProvider, InvocationEnvelope, ProviderError,
    ReportInvocation,
};
use email_reports::AppState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Credentials as the stub provider hands them out.
#[allow(dead_code)]
pub fn test_credentials(token: &str) -> StoredCredentials {
    StoredCredentials {
        token: token.to_string(),
        refresh_token: Some(format!("{token}-refresh")),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        client_id: "test-client-id.apps.googleusercontent.com".to_string(),
        client_secret: "test_secret".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()],
    }
}

/// Identity provider that never leaves the process.
#[derive(Default)]
pub struct StubIdentityProvider {
    pub email: String,
    pub fail_exchange: bool,
    pub fail_profile: bool,
    pub exchange_calls: AtomicUsize,
}

#[allow(dead_code)]
impl StubIdentityProvider {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            ..Default::default()
        }
    }

    pub fn failing_exchange() -> Self {
        Self {
            fail_exchange: true,
            ..Self::new("user@example.com")
        }
    }

    pub fn failing_profile() -> Self {
        Self {
            fail_profile: true,
            ..Self::new("user@example.com")
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    fn authorization_url(&self, state: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "https://accounts.example.test/auth?access_type=offline&prompt=consent&state={state}"
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredCredentials, ProviderError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exchange {
            return Err(ProviderError::Rejected {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            });
        }
        Ok(test_credentials(&format!("access-{code}")))
    }

    async fn fetch_email(&self, _access_token: &str) -> Result<String, ProviderError> {
        if self.fail_profile {
            return Err(ProviderError::Rejected {
                status: 403,
                body: "forbidden".to_string(),
            });
        }
        Ok(self.email.clone())
    }
}

/// Scripted compute backend that counts invocations.
///
/// Responses are served in order; once the script runs out every call gets
/// a plain successful report.
#[derive(Default)]
pub struct CountingCompute {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<InvocationEnvelope, String>>>,
    delay: Option<Duration>,
    last_request: Mutex<Option<serde_json::Value>>,
}

#[allow(dead_code)]
impl CountingCompute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue a response whose payload is `payload` verbatim.
    pub fn push_payload(&self, function_error: Option<&str>, payload: &str) {
        self.script.lock().unwrap().push_back(Ok(InvocationEnvelope {
            function_error: function_error.map(str::to_string),
            payload: payload.as_bytes().to_vec(),
        }));
    }

    /// Queue a transport failure.
    pub fn push_transport_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// JSON of the most recent invocation request.
    pub fn last_request(&self) -> Option<serde_json::Value> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputeBackend for CountingCompute {
    async fn invoke(
        &self,
        request: &ReportInvocation,
    ) -> Result<InvocationEnvelope, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(serde_json::to_value(request)?);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(envelope)) => Ok(envelope),
            Some(Err(message)) => Err(ComputeError::Transport(message)),
            None => Ok(InvocationEnvelope {
                function_error: None,
                payload: br#"{"statusCode":200,"body":{"total":5}}"#.to_vec(),
            }),
        }
    }
}

/// Everything a test may want to poke at behind the router.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub provider: Arc<StubIdentityProvider>,
    pub compute: Arc<CountingCompute>,
}

/// Create a test app with in-memory storage and stub backends.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(
        Config::test_default(),
        StubIdentityProvider::new("user@example.com"),
        CountingCompute::new(),
    )
}

#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    provider: StubIdentityProvider,
    compute: CountingCompute,
) -> TestApp {
    let db = Arc::new(MemoryDb::new());
    let provider = Arc::new(provider);
    let compute = Arc::new(compute);

    let state = Arc::new(AppState::new(
        config,
        db.clone(),
        provider.clone(),
        compute.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        provider,
        compute,
    }
}

/// Store credentials for `email` and open a session, as a completed login would.
#[allow(dead_code)]
pub async fn login_as(app: &TestApp, email: &str) -> String {
    app.db
        .upsert_credentials(email, &test_credentials("seeded"), chrono::Utc::now())
        .await
        .unwrap();
    app.state.sessions.establish(email).unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
