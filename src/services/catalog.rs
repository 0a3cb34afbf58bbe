// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Catalog API client (Spotify Web API shape).
//!
//! Handles:
//! - Token endpoint calls (authorization code and refresh grants)
//! - Authenticated GETs, with the response classified for the retry controller
//! - URL building for every endpoint the sync walks

use crate::config::Config;
use crate::error::AppError;
use crate::models::credential::TokenResponse;
use serde_json::Value;

/// OAuth scopes needed to read followed artists, saved shows and their content.
pub const OAUTH_SCOPE: &str = "user-follow-read,user-read-playback-position,user-library-read";

/// Page size for followed-list endpoints (provider maximum).
const FOLLOWED_PAGE_SIZE: u32 = 50;

/// Classified reply to an authenticated catalog GET.
#[derive(Debug)]
pub enum CatalogReply {
    /// 2xx with a JSON body
    Json(Value),
    /// 401: the access token was rejected
    Unauthorized,
    /// 429: rate limited
    RateLimited,
    /// Any other non-2xx status
    Failed { status: u16, body: String },
}

/// Classified reply from the token endpoint.
#[derive(Debug)]
pub enum TokenReply {
    Granted(TokenResponse),
    /// 400 or 429: the grant was refused and must not be retried
    Rejected { status: u16, body: String },
    /// Any other non-2xx status
    Failed { status: u16, body: String },
}

/// Catalog API client.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    api_url: String,
    accounts_url: String,
    client_id: String,
    client_secret: String,
}

impl CatalogClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.catalog_api_url.clone(),
            accounts_url: config.catalog_accounts_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    // ─── URL Builders ────────────────────────────────────────────

    /// Provider consent page for the authorization-code flow.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&scope={}&redirect_uri={}&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }

    pub fn followed_artists_url(&self) -> String {
        format!(
            "{}/me/following?type=artist&limit={}",
            self.api_url, FOLLOWED_PAGE_SIZE
        )
    }

    pub fn saved_shows_url(&self) -> String {
        format!("{}/me/shows?limit={}", self.api_url, FOLLOWED_PAGE_SIZE)
    }

    pub fn artist_albums_url(&self, artist_id: &str, group: &str, limit: u32) -> String {
        format!(
            "{}/artists/{}/albums?include_groups={}&limit={}",
            self.api_url,
            urlencoding::encode(artist_id),
            urlencoding::encode(group),
            limit
        )
    }

    pub fn show_episodes_url(&self, show_id: &str, limit: u32) -> String {
        format!(
            "{}/shows/{}/episodes?limit={}",
            self.api_url,
            urlencoding::encode(show_id),
            limit
        )
    }

    // ─── Requests ────────────────────────────────────────────────

    /// GET an absolute catalog URL with a bearer token.
    ///
    /// Transport failures surface as `ItemFetch` with no status.
    pub async fn get(&self, url: &str, access_token: &str) -> Result<CatalogReply, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::ItemFetch {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            let body = response.json().await.map_err(|e| AppError::ItemFetch {
                status: Some(status.as_u16()),
                message: format!("JSON parse error: {}", e),
            })?;
            return Ok(CatalogReply::Json(body));
        }

        match status.as_u16() {
            401 => Ok(CatalogReply::Unauthorized),
            429 => {
                tracing::warn!(url, "Catalog rate limit hit (429)");
                Ok(CatalogReply::RateLimited)
            }
            code => Ok(CatalogReply::Failed {
                status: code,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenReply, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Trade a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenReply, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenReply, AppError> {
        let url = format!("{}/api/token", self.accounts_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::CatalogApi(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let token = response
                .json()
                .await
                .map_err(|e| AppError::CatalogApi(format!("JSON parse error: {}", e)))?;
            return Ok(TokenReply::Granted(token));
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            code @ (400 | 429) => Ok(TokenReply::Rejected { status: code, body }),
            code => Ok(TokenReply::Failed { status: code, body }),
        }
    }
}
