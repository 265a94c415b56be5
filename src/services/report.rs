// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report generation.
//!
//! [`ReportGenerator::generate`] never fails: every path ends in a
//! [`ReportOutcome`], which serializes to either
//! `{"ok": true, "report_id", "report"}` or
//! `{"ok": false, "error": {"kind", "details"}}`.

use crate::db::Database;
use crate::models::Report;
use crate::services::compute::{ComputeBackend, ReportInvocation};
use crate::services::normalize;
use crate::services::session::SessionStore;
use crate::time_utils::format_storage_timestamp;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Look-back window used when the client does not send one.
pub const DEFAULT_REPORT_DAYS: u32 = 7;

/// Closed set of report failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportErrorKind {
    /// No or invalid session
    Auth,
    /// No stored credentials for the session's user
    NotFound,
    /// The report function raised
    LambdaFunctionError,
    /// The report function returned a non-200 status
    ReportGenerationFailed,
    /// Anything else (transport, storage, timeout)
    Server,
}

/// A typed report failure with whatever details could be recovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportError {
    pub kind: ReportErrorKind,
    pub details: Value,
}

impl ReportError {
    pub fn new(kind: ReportErrorKind, details: impl Into<Value>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }
}

/// Result of one report request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Generated { report_id: String, report: Value },
    Failed(ReportError),
}

impl ReportOutcome {
    fn failed(kind: ReportErrorKind, details: impl Into<Value>) -> Self {
        ReportOutcome::Failed(ReportError::new(kind, details))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ReportOutcome::Generated { .. })
    }

    /// Failure kind, if any.
    pub fn error_kind(&self) -> Option<ReportErrorKind> {
        match self {
            ReportOutcome::Generated { .. } => None,
            ReportOutcome::Failed(err) => Some(err.kind),
        }
    }
}

/// Wire shape shared by both outcomes.
#[derive(Serialize)]
struct OutcomeBody<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ReportError>,
}

impl Serialize for ReportOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            ReportOutcome::Generated { report_id, report } => OutcomeBody {
                ok: true,
                report_id: Some(report_id),
                report: Some(report),
                error: None,
            },
            ReportOutcome::Failed(error) => OutcomeBody {
                ok: false,
                report_id: None,
                report: None,
                error: Some(error),
            },
        };
        body.serialize(serializer)
    }
}

/// Always HTTP 200; `ok` carries the result.
impl IntoResponse for ReportOutcome {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Runs the report function on behalf of a logged-in user.
#[derive(Clone)]
pub struct ReportGenerator {
    db: Arc<dyn Database>,
    compute: Arc<dyn ComputeBackend>,
    sessions: Arc<SessionStore>,
    deadline: Duration,
}

impl ReportGenerator {
    pub fn new(
        db: Arc<dyn Database>,
        compute: Arc<dyn ComputeBackend>,
        sessions: Arc<SessionStore>,
        deadline: Duration,
    ) -> Self {
        Self {
            db,
            compute,
            sessions,
            deadline,
        }
    }

    /// Generate and store a report for the session's user.
    pub async fn generate(&self, session_token: Option<&str>, days: Option<u32>) -> ReportOutcome {
        let Some(email) = session_token.and_then(|token| self.sessions.resolve(token)) else {
            return ReportOutcome::failed(ReportErrorKind::Auth, "Not authenticated");
        };
        let days = days.unwrap_or(DEFAULT_REPORT_DAYS);

        match self.run(&email, days).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Report generation error");
                ReportOutcome::failed(ReportErrorKind::Server, e.to_string())
            }
        }
    }

    async fn run(&self, email: &str, days: u32) -> anyhow::Result<ReportOutcome> {
        let Some(user) = self.db.get_user(email).await? else {
            return Ok(ReportOutcome::failed(
                ReportErrorKind::NotFound,
                "User not found",
            ));
        };

        let request = ReportInvocation {
            user_email: user.email,
            credentials: user.credentials,
            days,
        };

        tracing::info!(email = %email, days, "Generating report");

        let envelope = tokio::time::timeout(self.deadline, self.compute.invoke(&request))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Report generation timed out after {}s",
                    self.deadline.as_secs()
                )
            })??;

        let report = match normalize::classify(&envelope) {
            Ok(report) => report,
            Err(failure) => return Ok(ReportOutcome::Failed(failure)),
        };

        let now = Utc::now();
        let record = Report {
            id: uuid::Uuid::new_v4().to_string(),
            user_email: email.to_string(),
            report,
            days,
            created_at: format_storage_timestamp(now),
        };

        self.db.insert_report(&record).await?;
        self.db.update_last_sync(email, now).await?;

        tracing::info!(email = %email, report_id = %record.id, "Report stored");

        Ok(ReportOutcome::Generated {
            report_id: record.id,
            report: record.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_outcome_wire_shape() {
        let outcome = ReportOutcome::Generated {
            report_id: "abc".to_string(),
            report: json!({"total": 5}),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"ok": true, "report_id": "abc", "report": {"total": 5}})
        );
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_failed_outcome_wire_shape() {
        let outcome = ReportOutcome::failed(
            ReportErrorKind::LambdaFunctionError,
            json!({"errorMessage": "timeout"}),
        );
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "ok": false,
                "error": {"kind": "LambdaFunctionError", "details": {"errorMessage": "timeout"}}
            })
        );
        assert_eq!(
            outcome.error_kind(),
            Some(ReportErrorKind::LambdaFunctionError)
        );
    }
}
