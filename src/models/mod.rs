// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod oauth_state;
pub mod report;
pub mod user;

pub use oauth_state::OAuthState;
pub use report::Report;
pub use user::{StoredCredentials, UserCredential};
