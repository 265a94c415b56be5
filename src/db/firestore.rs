// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - OAuth states (single-use CSRF tokens)
//! - Users (OAuth credentials, keyed by email)
//! - Reports (generated report history)

use super::{user_doc_id, CredentialStore, ReportArchive, StateLedger};
use crate::db::collections;
use crate::error::AppError;
use crate::models::{OAuthState, Report, StoredCredentials, UserCredential};
use crate::time_utils::format_storage_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }
}

// ─── OAuth State Operations ───────────────────────────────────

#[async_trait]
impl StateLedger for FirestoreDb {
    async fn insert_state(&self, state: &OAuthState) -> Result<(), AppError> {
        let _: OAuthState = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::OAUTH_STATES)
            .document_id(&state.state)
            .object(state)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn consume_state(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthState>, AppError> {
        let client = self.get_client()?;

        let stored: Option<OAuthState> = client
            .fluent()
            .select()
            .by_id_in(collections::OAUTH_STATES)
            .obj()
            .one(state)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(stored) = stored.filter(|s| s.is_live(now)) else {
            return Ok(None);
        };

        // The Exists precondition makes the delete the single point of
        // contention: only one concurrent caller removes the document.
        let deleted = client
            .fluent()
            .delete()
            .from(collections::OAUTH_STATES)
            .document_id(state)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .execute()
            .await;

        match deleted {
            Ok(()) => Ok(Some(stored)),
            Err(FirestoreError::DataNotFoundError(_)) => {
                tracing::warn!("OAuth state consumed concurrently");
                Ok(None)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get_user(&self, email: &str) -> Result<Option<UserCredential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_doc_id(email))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_credentials(
        &self,
        email: &str,
        credentials: &StoredCredentials,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let doc_id = user_doc_id(email);
        let timestamp = format_storage_timestamp(now);

        let user = UserCredential {
            email: email.to_string(),
            credentials: credentials.clone(),
            created_at: timestamp.clone(),
            updated_at: timestamp,
            last_sync: None,
        };

        // Insert fails if the document exists; in that case only the
        // credentials block is replaced so created_at and last_sync survive.
        let inserted: Result<UserCredential, FirestoreError> = client
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&doc_id)
            .object(&user)
            .execute()
            .await;

        match inserted {
            Ok(_) => {
                tracing::info!("Created user record");
                Ok(())
            }
            Err(FirestoreError::DataConflictError(_)) => {
                let _: () = client
                    .fluent()
                    .update()
                    .fields(firestore::paths!(UserCredential::{email, credentials, updated_at}))
                    .in_col(collections::USERS)
                    .document_id(&doc_id)
                    .object(&user)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                tracing::info!("Replaced credentials on existing user record");
                Ok(())
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn update_last_sync(&self, email: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut user = self
            .get_user(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;
        user.last_sync = Some(format_storage_timestamp(at));

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(UserCredential::{last_sync}))
            .in_col(collections::USERS)
            .document_id(user_doc_id(email))
            .object(&user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Report Operations ───────────────────────────────────────

#[async_trait]
impl ReportArchive for FirestoreDb {
    async fn insert_report(&self, report: &Report) -> Result<(), AppError> {
        let _: Report = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::REPORTS)
            .document_id(&report.id)
            .object(report)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Requires a composite index on (`user_email`, `created_at` desc).
    async fn list_reports(&self, email: &str, limit: u32) -> Result<Vec<Report>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REPORTS)
            .filter(|q| q.for_all([q.field("user_email").eq(email)]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
