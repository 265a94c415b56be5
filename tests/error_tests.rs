// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use email_reports::error::AppError;
use email_reports::services::HandshakeError;

mod common;
use common::body_json;

#[tokio::test]
async fn test_database_error_is_not_leaked() {
    let response = AppError::Database("connection refused to 10.0.0.3".to_string()).into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "database_error");
    assert!(!body.to_string().contains("10.0.0.3"));
}

#[tokio::test]
async fn test_internal_handshake_error_is_generic() {
    let response = AppError::from(HandshakeError::Internal("db down".to_string())).into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "Server");
    assert_eq!(body["error"], "Authentication failed");
}

#[tokio::test]
async fn test_configuration_error_names_problem() {
    let response = AppError::from(HandshakeError::Configuration(
        "OAuth client is not configured: client id".to_string(),
    ))
    .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "Configuration");
    assert!(body["error"].as_str().unwrap().contains("client id"));
}

#[tokio::test]
async fn test_not_found_carries_details() {
    let response = AppError::NotFound("User x not found".to_string()).into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["details"], "User x not found");
}
