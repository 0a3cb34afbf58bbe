// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Required values (client credentials, public URL) abort startup when
//! missing. Everything else has a default; an unparsable value is logged
//! and replaced by that default.

use crate::models::DateSorting;
use crate::services::scheduler::{parse_crontab, DEFAULT_CRON};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_INCLUDE_GROUPS: &[&str] = &["album", "single", "compilation", "appears_on"];

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Catalog OAuth client ---
    pub client_id: String,
    pub client_secret: String,
    /// Public base URL of this service; the OAuth redirect is `{application_url}/auth`
    pub application_url: String,
    pub catalog_api_url: String,
    pub catalog_accounts_url: String,

    // --- Server ---
    pub listen_host: String,
    pub port: u16,

    // --- Sync tuning ---
    /// Page size for album and episode listings
    pub albums_request_limit: u32,
    /// Pause between two entities during a sync
    pub request_delay: Duration,
    /// Recency window in days
    pub newer_than_days: i64,
    pub default_sorting: DateSorting,
    /// Release groups queried per artist, one request chain each
    pub include_groups: Vec<String>,
    /// Five-field crontab expression (UTC) of the scheduled sync
    pub sync_cron: String,
    pub max_retries: u32,
    pub rate_limit_backoff: Duration,
    /// Bound of each status subscriber's queue
    pub status_queue_capacity: usize,

    // --- Storage ---
    pub data_dir: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let application_url = required("APPLICATION_URL")?
            .trim_end_matches('/')
            .to_string();

        let include_groups = match lookup("INCLUDE_GROUPS") {
            Some(raw) => {
                let groups: Vec<String> = raw
                    .split(',')
                    .map(|g| g.trim().to_string())
                    .filter(|g| !g.is_empty())
                    .collect();
                if groups.is_empty() {
                    tracing::error!(value = %raw, "INCLUDE_GROUPS is empty, using default");
                    default_include_groups()
                } else {
                    groups
                }
            }
            None => default_include_groups(),
        };

        let sync_cron = match lookup("CRON") {
            Some(raw) => match parse_crontab(raw.trim()) {
                Ok(_) => raw.trim().to_string(),
                Err(e) => {
                    tracing::error!(
                        value = %raw,
                        error = %e,
                        default = DEFAULT_CRON,
                        "Invalid CRON, using default"
                    );
                    DEFAULT_CRON.to_string()
                }
            },
            None => DEFAULT_CRON.to_string(),
        };

        Ok(Self {
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            application_url,
            catalog_api_url: lookup("CATALOG_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.spotify.com/v1".to_string()),
            catalog_accounts_url: lookup("CATALOG_ACCOUNTS_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://accounts.spotify.com".to_string()),
            listen_host: lookup("LISTEN_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8000),
            albums_request_limit: parse_or(&lookup, "ALBUMS_REQUEST_LIMIT", 5),
            request_delay: Duration::from_secs(parse_or(&lookup, "REQUEST_DELAY_SECS", 0)),
            newer_than_days: parse_or(&lookup, "NEWER_THAN_DAYS", 30),
            default_sorting: parse_or(&lookup, "DEFAULT_SORTING", DateSorting::ReleaseDate),
            include_groups,
            sync_cron,
            max_retries: parse_or(&lookup, "MAX_RETRIES", 3),
            rate_limit_backoff: Duration::from_secs(parse_or(
                &lookup,
                "RATE_LIMIT_BACKOFF_SECS",
                5,
            )),
            status_queue_capacity: parse_or(&lookup, "STATUS_QUEUE_CAPACITY", 16).max(1),
            data_dir: lookup("DATA_DIR").unwrap_or_else(|| "data".to_string()),
        })
    }

    /// Config pointing at local mocks, for tests only.
    pub fn test_default() -> Self {
        Self {
            client_id: "test_client_id".to_string(),
            client_secret: "test_secret".to_string(),
            application_url: "http://localhost:8000".to_string(),
            catalog_api_url: "http://127.0.0.1:1/v1".to_string(),
            catalog_accounts_url: "http://127.0.0.1:1".to_string(),
            listen_host: "127.0.0.1".to_string(),
            port: 8000,
            albums_request_limit: 5,
            request_delay: Duration::ZERO,
            newer_than_days: 30,
            default_sorting: DateSorting::ReleaseDate,
            include_groups: default_include_groups(),
            sync_cron: DEFAULT_CRON.to_string(),
            max_retries: 3,
            rate_limit_backoff: Duration::from_millis(10),
            status_queue_capacity: 16,
            data_dir: "data".to_string(),
        }
    }
}

fn default_include_groups() -> Vec<String> {
    DEFAULT_INCLUDE_GROUPS.iter().map(|g| g.to_string()).collect()
}

/// Parse an optional setting, falling back to `default` (with an error log)
/// when the value is present but invalid.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e: T::Err| {
            tracing::error!(
                key,
                value = %raw,
                error = %e,
                default = %default,
                "Invalid configuration value, using default"
            );
            default
        }),
        None => default,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
