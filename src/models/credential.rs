// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential for the single connected user.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The stored token triple. Replaced wholesale on every exchange or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute instant after which the access token is no longer valid
    pub expires_on: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_on <= now
    }
}

/// Body returned by the token endpoint for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Omitted by the provider on most refresh responses
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Build the credential this response describes, reusing `previous_refresh`
    /// when the response carries no refresh token of its own.
    pub fn into_credential(self, now: DateTime<Utc>, previous_refresh: Option<&str>) -> Credential {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();

        Credential {
            access_token: self.access_token,
            refresh_token,
            expires_on: now + Duration::seconds(self.expires_in),
            scope: self.scope,
            token_type: self.token_type,
        }
    }
}
