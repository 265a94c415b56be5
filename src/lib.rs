// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Email Reports: Gmail activity reports generated on demand.
//!
//! This crate provides the backend API: Google OAuth login for Gmail
//! read-only access, and a report endpoint that runs the report function
//! on AWS Lambda and keeps a history of results.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{AuthHandshake, ComputeBackend, IdentityProvider, ReportGenerator, SessionStore};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Database>,
    pub sessions: Arc<SessionStore>,
    pub handshake: AuthHandshake,
    pub reports: ReportGenerator,
}

impl AppState {
    /// Wire the services together over the given backends.
    pub fn new(
        config: Config,
        db: Arc<dyn Database>,
        provider: Arc<dyn IdentityProvider>,
        compute: Arc<dyn ComputeBackend>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(&config.session_signing_key));
        let handshake = AuthHandshake::new(db.clone(), provider, sessions.clone());
        let reports = ReportGenerator::new(
            db.clone(),
            compute,
            sessions.clone(),
            config.report_deadline,
        );

        Self {
            config,
            db,
            sessions,
            handshake,
            reports,
        }
    }
}
