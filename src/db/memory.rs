//! In-process document store.
//!
//! Used for local development (`STORAGE_BACKEND=memory`) and by the test
//! suite. Per-key atomicity comes from `DashMap`'s shard locks.

use super::{user_doc_id, CredentialStore, ReportArchive, StateLedger};
use crate::error::AppError;
use crate::models::{OAuthState, Report, StoredCredentials, UserCredential};
use crate::time_utils::format_storage_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Document store held entirely in memory.
#[derive(Default)]
pub struct MemoryDb {
    states: DashMap<String, OAuthState>,
    users: DashMap<String, UserCredential>,
    reports: DashMap<String, Report>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of state records physically present, including expired ones.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of stored reports across all users.
    pub fn report_count(&self) -> usize {
        self.reports.len()
    }
}

#[async_trait]
impl StateLedger for MemoryDb {
    async fn insert_state(&self, state: &OAuthState) -> Result<(), AppError> {
        self.states.insert(state.state.clone(), state.clone());
        Ok(())
    }

    async fn consume_state(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthState>, AppError> {
        Ok(self
            .states
            .remove_if(state, |_, stored| stored.is_live(now))
            .map(|(_, stored)| stored))
    }
}

#[async_trait]
impl CredentialStore for MemoryDb {
    async fn get_user(&self, email: &str) -> Result<Option<UserCredential>, AppError> {
        Ok(self.users.get(&user_doc_id(email)).map(|u| u.clone()))
    }

    async fn upsert_credentials(
        &self,
        email: &str,
        credentials: &StoredCredentials,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let timestamp = format_storage_timestamp(now);

        self.users
            .entry(user_doc_id(email))
            .and_modify(|user| {
                user.credentials = credentials.clone();
                user.updated_at = timestamp.clone();
            })
            .or_insert_with(|| UserCredential {
                email: email.to_string(),
                credentials: credentials.clone(),
                created_at: timestamp.clone(),
                updated_at: timestamp.clone(),
                last_sync: None,
            });
        Ok(())
    }

    async fn update_last_sync(&self, email: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut user = self
            .users
            .get_mut(&user_doc_id(email))
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;
        user.last_sync = Some(format_storage_timestamp(at));
        Ok(())
    }
}

#[async_trait]
impl ReportArchive for MemoryDb {
    async fn insert_report(&self, report: &Report) -> Result<(), AppError> {
        self.reports.insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn list_reports(&self, email: &str, limit: u32) -> Result<Vec<Report>, AppError> {
        let mut reports: Vec<Report> = self
            .reports
            .iter()
            .filter(|r| r.user_email == email)
            .map(|r| r.value().clone())
            .collect();

        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit as usize);
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credentials(token: &str) -> StoredCredentials {
        StoredCredentials {
            token: token.to_string(),
            refresh_token: Some("refresh".to_string()),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![crate::config::GMAIL_READONLY_SCOPE.to_string()],
        }
    }

    #[tokio::test]
    async fn test_consume_state_is_single_use() {
        let db = MemoryDb::new();
        let now = Utc::now();
        db.insert_state(&OAuthState::issue("s1".to_string(), now))
            .await
            .unwrap();

        assert!(db.consume_state("s1", now).await.unwrap().is_some());
        assert!(db.consume_state("s1", now).await.unwrap().is_none());
        assert_eq!(db.state_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_state_is_invisible_but_not_purged() {
        let db = MemoryDb::new();
        let issued = Utc::now() - Duration::minutes(11);
        db.insert_state(&OAuthState::issue("old".to_string(), issued))
            .await
            .unwrap();

        assert!(db.consume_state("old", Utc::now()).await.unwrap().is_none());
        assert_eq!(db.state_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_consume_has_one_winner() {
        let db = std::sync::Arc::new(MemoryDb::new());
        let now = Utc::now();
        db.insert_state(&OAuthState::issue("race".to_string(), now))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.consume_state("race", now).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at_and_last_sync() {
        let db = MemoryDb::new();
        let first = Utc::now() - Duration::days(3);
        db.upsert_credentials("a@example.com", &credentials("t1"), first)
            .await
            .unwrap();
        let synced = first + Duration::days(1);
        db.update_last_sync("a@example.com", synced).await.unwrap();

        let second = Utc::now();
        db.upsert_credentials("a@example.com", &credentials("t2"), second)
            .await
            .unwrap();

        let user = db.get_user("a@example.com").await.unwrap().unwrap();
        assert_eq!(user.credentials.token, "t2");
        assert_eq!(user.created_at, format_storage_timestamp(first));
        assert_eq!(user.updated_at, format_storage_timestamp(second));
        assert_eq!(user.last_sync, Some(format_storage_timestamp(synced)));
    }

    #[tokio::test]
    async fn test_update_last_sync_for_unknown_user() {
        let db = MemoryDb::new();
        let result = db.update_last_sync("nobody@example.com", Utc::now()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_reports_newest_first_and_capped() {
        let db = MemoryDb::new();
        let base = Utc::now();

        for i in 0..12 {
            db.insert_report(&Report {
                id: format!("r{i}"),
                user_email: "a@example.com".to_string(),
                report: serde_json::json!({ "n": i }),
                days: 7,
                created_at: format_storage_timestamp(base + Duration::seconds(i)),
            })
            .await
            .unwrap();
        }
        db.insert_report(&Report {
            id: "other".to_string(),
            user_email: "b@example.com".to_string(),
            report: serde_json::json!({}),
            days: 7,
            created_at: format_storage_timestamp(base + Duration::hours(1)),
        })
        .await
        .unwrap();

        let reports = db.list_reports("a@example.com", 10).await.unwrap();
        assert_eq!(reports.len(), 10);
        assert_eq!(reports[0].id, "r11");
        assert_eq!(reports[9].id, "r2");
        assert!(reports.iter().all(|r| r.user_email == "a@example.com"));
    }
}
