// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! OAuth handshake state stored between login and callback.

use crate::time_utils::{format_storage_timestamp, parse_utc_rfc3339};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long an issued state value stays redeemable.
pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Single-use CSRF state for one authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    /// Random state value (also used as document ID)
    pub state: String,
    /// When the login was initiated
    pub created_at: String,
    /// After this instant the state no longer matches
    pub expires_at: String,
}

impl OAuthState {
    /// Create a state record issued at `now`.
    pub fn issue(state: String, now: DateTime<Utc>) -> Self {
        Self {
            state,
            created_at: format_storage_timestamp(now),
            expires_at: format_storage_timestamp(now + Duration::minutes(OAUTH_STATE_TTL_MINUTES)),
        }
    }

    /// Whether the state is still redeemable at `now` (`expires_at > now`).
    ///
    /// An unparseable expiry is treated as expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        parse_utc_rfc3339(&self.expires_at)
            .map(|expires_at| expires_at > now)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_expires_after_ten_minutes() {
        let issued = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        let state = OAuthState::issue("abc".to_string(), issued);

        assert!(state.is_live(issued));
        assert!(state.is_live(issued + Duration::minutes(9)));
        // expires_at == now is already expired
        assert!(!state.is_live(issued + Duration::minutes(10)));
        assert!(!state.is_live(issued + Duration::hours(1)));
    }

    #[test]
    fn test_corrupt_expiry_never_matches() {
        let state = OAuthState {
            state: "abc".to_string(),
            created_at: "garbage".to_string(),
            expires_at: "garbage".to_string(),
        };
        assert!(!state.is_live(Utc::now()));
    }
}
