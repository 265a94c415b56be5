// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report generation backend (AWS Lambda).
//!
//! The Lambda does the actual Gmail crawling. This module only knows how to
//! invoke it synchronously and hand back the raw response envelope; making
//! sense of the envelope is `services::normalize`'s job.

use crate::config::Config;
use crate::models::StoredCredentials;
use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use serde::Serialize;

/// Payload sent to the report function.
#[derive(Debug, Clone, Serialize)]
pub struct ReportInvocation {
    pub user_email: String,
    pub credentials: StoredCredentials,
    pub days: u32,
}

/// Raw response of a synchronous invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationEnvelope {
    /// Set when the function itself raised (`Handled`/`Unhandled`)
    pub function_error: Option<String>,
    /// Undecoded response payload
    pub payload: Vec<u8>,
}

/// Errors reaching the compute backend.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Failed to encode invocation payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Lambda invocation failed: {0}")]
    Transport(String),
}

/// Something that can run the report function once.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn invoke(&self, request: &ReportInvocation)
        -> Result<InvocationEnvelope, ComputeError>;
}

/// Lambda-backed compute backend.
///
/// Read timeout and transport retries are configured on the SDK client, so
/// one call to [`ComputeBackend::invoke`] is one logical invocation.
#[derive(Clone)]
pub struct LambdaBackend {
    client: aws_sdk_lambda::Client,
    function_name: String,
}

impl LambdaBackend {
    pub async fn new(config: &Config) -> Self {
        let retry = aws_config::retry::RetryConfig::standard()
            .with_max_attempts(config.lambda_max_attempts);
        let timeouts = aws_config::timeout::TimeoutConfig::builder()
            .read_timeout(config.lambda_read_timeout)
            .build();

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .retry_config(retry)
            .timeout_config(timeouts)
            .load()
            .await;

        tracing::info!(
            function = %config.lambda_function_name,
            region = %config.aws_region,
            max_attempts = config.lambda_max_attempts,
            read_timeout_secs = config.lambda_read_timeout.as_secs(),
            "Lambda client initialized"
        );

        Self {
            client: aws_sdk_lambda::Client::new(&sdk_config),
            function_name: config.lambda_function_name.clone(),
        }
    }
}

#[async_trait]
impl ComputeBackend for LambdaBackend {
    async fn invoke(
        &self,
        request: &ReportInvocation,
    ) -> Result<InvocationEnvelope, ComputeError> {
        let payload = serde_json::to_vec(request)?;

        tracing::debug!(
            function = %self.function_name,
            days = request.days,
            "Invoking report function"
        );

        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| ComputeError::Transport(DisplayErrorContext(&e).to_string()))?;

        Ok(InvocationEnvelope {
            function_error: output.function_error().map(str::to_string),
            payload: output
                .payload()
                .map(|blob| blob.as_ref().to_vec())
                .unwrap_or_default(),
        })
    }
}
