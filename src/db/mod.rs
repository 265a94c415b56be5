//! Database layer.
//!
//! The three stores the service needs are expressed as traits so handlers can
//! run against Firestore in production and an in-process store locally and
//! in tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{OAuthState, Report, StoredCredentials, UserCredential};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    /// Pending OAuth handshake states (keyed by state value)
    pub const OAUTH_STATES: &str = "oauth_states";
    /// User credentials (keyed by email)
    pub const USERS: &str = "users";
    /// Generated reports (keyed by report id)
    pub const REPORTS: &str = "reports";
}

/// Number of reports returned by the listing endpoint.
pub const RECENT_REPORTS_LIMIT: u32 = 10;

/// Short-lived, single-use OAuth handshake states.
#[async_trait]
pub trait StateLedger: Send + Sync {
    /// Store a freshly issued state.
    async fn insert_state(&self, state: &OAuthState) -> Result<(), AppError>;

    /// Find a state with `expires_at > now` and delete it in one step.
    ///
    /// Returns `None` for unknown, expired, or already consumed values. Of
    /// several concurrent calls for the same value at most one returns `Some`.
    /// Expired states are left in place.
    async fn consume_state(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthState>, AppError>;
}

/// Per-user OAuth credentials and sync bookkeeping.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user(&self, email: &str) -> Result<Option<UserCredential>, AppError>;

    /// Insert the user or overwrite only its credentials block.
    ///
    /// `created_at` is set on first insert only and `last_sync` is never
    /// touched.
    async fn upsert_credentials(
        &self,
        email: &str,
        credentials: &StoredCredentials,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Record a successful report generation.
    async fn update_last_sync(&self, email: &str, at: DateTime<Utc>) -> Result<(), AppError>;
}

/// Append-only archive of generated reports.
#[async_trait]
pub trait ReportArchive: Send + Sync {
    async fn insert_report(&self, report: &Report) -> Result<(), AppError>;

    /// Most recent reports for a user, newest first.
    async fn list_reports(&self, email: &str, limit: u32) -> Result<Vec<Report>, AppError>;
}

/// Everything the application needs from its document store.
pub trait Database: StateLedger + CredentialStore + ReportArchive {}

impl<T: StateLedger + CredentialStore + ReportArchive> Database for T {}

/// Document ID for a user record.
///
/// Emails may legally contain `/`, which Firestore reserves.
pub(crate) fn user_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}
