// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bounded retry around a single catalog GET.
//!
//! A 401 triggers a token refresh, a 429 a fixed backoff; both spend from the
//! same retry budget. Anything else ends the call with `ItemFetch`.

use crate::config::Config;
use crate::error::AppError;
use crate::services::catalog::{CatalogClient, CatalogReply};
use crate::services::credentials::CredentialStore;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_backoff: config.rate_limit_backoff,
        }
    }
}

#[derive(Clone)]
pub struct RetryController {
    catalog: CatalogClient,
    credentials: CredentialStore,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(catalog: CatalogClient, credentials: CredentialStore, policy: RetryPolicy) -> Self {
        Self {
            catalog,
            credentials,
            policy,
        }
    }

    /// GET `url` and return its JSON body.
    ///
    /// `resource` and `context` only label log lines. Credential errors
    /// (missing user, refresh rejected) propagate unchanged.
    pub async fn call(&self, url: &str, resource: &str, context: &str) -> Result<Value, AppError> {
        let mut retries_left = self.policy.max_retries;
        let mut access_token = self.credentials.access_token().await?;

        loop {
            let (status, message) = match self.catalog.get(url, &access_token).await {
                Ok(CatalogReply::Json(body)) => return Ok(body),
                Ok(CatalogReply::Unauthorized) if retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(resource, context, retries_left, "Access token rejected, refreshing");
                    access_token = self
                        .credentials
                        .refresh_rejected(&access_token)
                        .await?
                        .access_token;
                    continue;
                }
                Ok(CatalogReply::RateLimited) if retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        resource,
                        context,
                        retries_left,
                        backoff_ms = self.policy.rate_limit_backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(self.policy.rate_limit_backoff).await;
                    continue;
                }
                Ok(CatalogReply::Unauthorized) => {
                    (Some(401), "access token rejected, retries exhausted".to_string())
                }
                Ok(CatalogReply::RateLimited) => {
                    (Some(429), "rate limited, retries exhausted".to_string())
                }
                Ok(CatalogReply::Failed { status, body }) => (Some(status), body),
                Err(AppError::ItemFetch { status, message }) => (status, message),
                Err(e) => return Err(e),
            };

            tracing::error!(
                resource,
                context,
                url,
                status = ?status,
                error = %message,
                "Error while fetching from catalog"
            );
            return Err(AppError::ItemFetch { status, message });
        }
    }
}
