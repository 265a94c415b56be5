// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report API routes.

use crate::db::RECENT_REPORTS_LIMIT;
use crate::error::Result;
use crate::middleware::auth::{session_token, AuthUser};
use crate::models::Report;
use crate::services::report::ReportOutcome;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Report generation. Authentication failures are reported in the body, so
/// this route is not behind `require_auth`.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/generate-report", post(generate_report))
}

/// Routes behind `require_auth` (applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/reports", get(list_reports))
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub days: Option<u32>,
}

impl GenerateReportRequest {
    /// Missing, empty or malformed bodies use the default window.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Ignoring malformed generate-report body");
            Self::default()
        })
    }
}

/// Generate a report. Always HTTP 200; `ok` in the body is authoritative.
async fn generate_report(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> ReportOutcome {
    let request = GenerateReportRequest::from_body(&body);
    let token = session_token(&jar, &headers);

    state.reports.generate(token.as_deref(), request.days).await
}

#[derive(Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<Report>,
}

/// Most recent reports for the current user, newest first.
async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ReportsResponse>> {
    let reports = state
        .db
        .list_reports(&user.email, RECENT_REPORTS_LIMIT)
        .await?;

    Ok(Json(ReportsResponse { reports }))
}
