// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth login, session status and logout routes.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::session_token;
use crate::services::handshake::CallbackParams;
use crate::services::session::SESSION_COOKIE;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", get(login))
        .route("/oauth2callback", get(oauth_callback))
        .route("/api/user/status", get(user_status))
        .route("/api/logout", post(logout))
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub auth_url: String,
}

/// Start the OAuth flow. The frontend navigates to `auth_url` itself.
async fn login(State(state): State<Arc<AppState>>) -> Result<Json<LoginResponse>> {
    let auth_url = state.handshake.initiate().await?;
    Ok(Json(LoginResponse { auth_url }))
}

/// Session cookie with the attributes used both to set and to remove it.
fn session_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!state.config.is_local_frontend())
        .build()
}

/// OAuth callback: redeem the state, store credentials, open a session.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let login = state.handshake.complete(params).await?;

    let mut cookie = session_cookie(&state, login.session_token);
    cookie.set_max_age(time::Duration::seconds(state.sessions.ttl_secs()));

    let redirect_url = format!(
        "{}/?status=success",
        state.config.frontend_url.trim_end_matches('/')
    );

    Ok((jar.add(cookie), Redirect::to(&redirect_url)))
}

#[derive(Debug, Serialize)]
pub struct UserStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<Option<String>>,
}

impl UserStatusResponse {
    fn anonymous() -> Self {
        Self {
            authenticated: false,
            email: None,
            last_sync: None,
        }
    }
}

/// Whether the caller has a live session backed by stored credentials.
async fn user_status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<UserStatusResponse>> {
    let Some(email) = session_token(&jar, &headers).and_then(|t| state.sessions.resolve(&t))
    else {
        return Ok(Json(UserStatusResponse::anonymous()));
    };

    let Some(user) = state.db.get_user(&email).await? else {
        return Ok(Json(UserStatusResponse::anonymous()));
    };

    Ok(Json(UserStatusResponse {
        authenticated: true,
        email: Some(user.email),
        last_sync: Some(user.last_sync),
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

/// End the session and drop the cookie. Works without a session too.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, Json<LogoutResponse>) {
    if let Some(token) = session_token(&jar, &headers) {
        state.sessions.clear(&token);
    }

    let jar = jar.remove(session_cookie(&state, String::new()));

    (
        jar,
        Json(LogoutResponse {
            message: "Logged out successfully",
        }),
    )
}
