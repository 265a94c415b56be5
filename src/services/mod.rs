// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod compute;
pub mod google_oauth;
pub mod handshake;
pub mod normalize;
pub mod report;
pub mod session;

pub use compute::{
    ComputeBackend, ComputeError, InvocationEnvelope, LambdaBackend, ReportInvocation,
};
pub use google_oauth::{GoogleOAuthClient, IdentityProvider, ProviderError};
pub use handshake::{AuthHandshake, CallbackParams, CompletedLogin, HandshakeError};
pub use report::{ReportError, ReportErrorKind, ReportGenerator, ReportOutcome};
pub use session::SessionStore;
