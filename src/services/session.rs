// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-held login sessions.
//!
//! A session token is an HS256 JWT whose `jti` indexes an in-memory entry
//! binding it to an email. Both the JWT `exp` and the entry's own expiry are
//! enforced, and logout removes the entry so a copied token stops working.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

/// Session lifetime.
pub const SESSION_TTL_SECS: i64 = 60 * 60;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "email_reports_session";

/// Generate a URL-safe random token from 32 bytes of system randomness.
pub fn random_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("System random generator failed"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Session token claims.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    /// Email the session is bound to
    sub: String,
    /// Session ID (key into the session map)
    jti: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    email: String,
    expires_at: DateTime<Utc>,
}

/// Mapping from session tokens to user emails.
pub struct SessionStore {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    entries: DashMap<String, SessionEntry>,
}

impl SessionStore {
    pub fn new(signing_key: &[u8]) -> Self {
        Self::with_ttl(signing_key, Duration::seconds(SESSION_TTL_SECS))
    }

    pub fn with_ttl(signing_key: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Session lifetime in seconds, for cookie `Max-Age`.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Start a session for `email` and return its token.
    pub fn establish(&self, email: &str) -> anyhow::Result<String> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let session_id = random_token()?;

        let claims = SessionClaims {
            sub: email.to_string(),
            jti: session_id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        // Drop sessions whose owners never came back.
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.insert(
            session_id,
            SessionEntry {
                email: email.to_string(),
                expires_at,
            },
        );

        Ok(token)
    }

    /// Email bound to `token`, if the session is live.
    ///
    /// Expiry is checked here rather than by the JWT library so an expired
    /// entry can be dropped as soon as its token is seen.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let claims = self.decode_claims(token)?;
        let now = Utc::now();

        let entry = self.entries.get(&claims.jti)?.clone();
        if entry.expires_at <= now || claims.exp < now.timestamp() {
            self.entries.remove(&claims.jti);
            return None;
        }
        if entry.email != claims.sub {
            tracing::warn!("Session token subject does not match session entry");
            return None;
        }

        Some(entry.email)
    }

    /// End the session behind `token`. Unknown or expired tokens are ignored.
    pub fn clear(&self, token: &str) {
        if let Some(claims) = self.decode_claims(token) {
            self.entries.remove(&claims.jti);
        }
    }

    /// Number of session entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verify the signature and decode claims; `exp` is left to the caller.
    fn decode_claims(&self, token: &str) -> Option<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_session_key_32_bytes_min!!";

    #[test]
    fn test_random_tokens_are_url_safe_and_distinct() {
        let a = random_token().unwrap();
        let b = random_token().unwrap();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_establish_and_resolve() {
        let sessions = SessionStore::new(KEY);
        let token = sessions.establish("a@example.com").unwrap();

        assert_eq!(sessions.resolve(&token), Some("a@example.com".to_string()));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let sessions = SessionStore::new(KEY);
        let token = sessions.establish("a@example.com").unwrap();

        sessions.clear(&token);
        sessions.clear(&token);
        sessions.clear("garbage");

        assert_eq!(sessions.resolve(&token), None);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_expired_session_is_absent_and_purged() {
        let sessions = SessionStore::with_ttl(KEY, Duration::zero());
        let token = sessions.establish("a@example.com").unwrap();

        assert_eq!(sessions.resolve(&token), None);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_establish_sweeps_abandoned_sessions() {
        let expired = SessionStore::with_ttl(KEY, Duration::zero());
        for i in 0..100 {
            expired.establish(&format!("user{i}@example.com")).unwrap();
        }
        // Each call swept the previous, already-expired entry.
        assert_eq!(expired.len(), 1);

        let sessions = SessionStore::new(KEY);
        let first = sessions.establish("a@example.com").unwrap();
        let second = sessions.establish("b@example.com").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions.resolve(&first), Some("a@example.com".to_string()));
        assert_eq!(sessions.resolve(&second), Some("b@example.com".to_string()));
    }

    #[test]
    fn test_token_from_other_key_is_rejected() {
        let ours = SessionStore::new(KEY);
        let theirs = SessionStore::new(b"some_other_signing_key_32_bytes");
        let token = theirs.establish("a@example.com").unwrap();

        assert_eq!(ours.resolve(&token), None);
        assert_eq!(ours.resolve("not.a.jwt"), None);
    }

    #[test]
    fn test_token_survives_only_in_issuing_process() {
        // Same key, different store: the JWT is valid but the entry is missing.
        let first = SessionStore::new(KEY);
        let second = SessionStore::new(KEY);
        let token = first.establish("a@example.com").unwrap();

        assert_eq!(second.resolve(&token), None);
    }
}
