// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store for the single connected user.
//!
//! Owns the OAuth credential: creates it from an authorization code, hands
//! out the current access token, and refreshes it when expired or rejected.
//! Refreshes are serialized; a caller that waited on the lock re-checks the
//! stored credential before hitting the token endpoint again.

use crate::db::MirrorDb;
use crate::error::AppError;
use crate::models::Credential;
use crate::services::catalog::{CatalogClient, TokenReply};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct CredentialStore {
    client: CatalogClient,
    db: MirrorDb,
    redirect_uri: String,
    login_url: String,
    refresh_lock: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(client: CatalogClient, db: MirrorDb, application_url: &str) -> Self {
        Self {
            client,
            db,
            redirect_uri: format!("{}/auth", application_url),
            login_url: format!("{}/login", application_url),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Provider consent URL carrying the given anti-forgery state.
    pub fn authorize_url(&self, state: &str) -> String {
        self.client.authorize_url(&self.redirect_uri, state)
    }

    /// Exchange an authorization code and store the resulting credential.
    ///
    /// Returns `Ok(None)` when the provider answered with an unexpected status;
    /// the user has to go through the login flow again.
    pub async fn exchange(&self, code: &str) -> Result<Option<Credential>, AppError> {
        match self.client.exchange_code(code, &self.redirect_uri).await? {
            TokenReply::Granted(token) => {
                let credential = token.into_credential(Utc::now(), None);
                self.db.set_credential(&credential).await?;
                tracing::info!(expires_on = %credential.expires_on, "User connected");
                Ok(Some(credential))
            }
            TokenReply::Rejected { status, body } => {
                tracing::error!(status, body = %body, "Authorization code rejected");
                Err(AppError::AuthExchange { status, body })
            }
            TokenReply::Failed { status, body } => {
                tracing::error!(
                    status,
                    body = %body,
                    login_url = %self.login_url,
                    "Authorization code exchange failed"
                );
                Ok(None)
            }
        }
    }

    /// The stored credential, refreshed first when expired and
    /// `refresh_if_expired` is set.
    pub async fn current(&self, refresh_if_expired: bool) -> Result<Option<Credential>, AppError> {
        let Some(credential) = self.db.get_credential().await? else {
            tracing::error!(
                login_url = %self.login_url,
                "No user connected, log in to the catalog first"
            );
            return Ok(None);
        };

        if !refresh_if_expired || !credential.is_expired(Utc::now()) {
            return Ok(Some(credential));
        }

        tracing::info!(expired_on = %credential.expires_on, "Access token expired, refreshing");

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(stored) = self.db.get_credential().await? {
            if !stored.is_expired(Utc::now()) {
                return Ok(Some(stored));
            }
        }

        self.refresh_locked().await.map(Some)
    }

    /// Access token for an API call, refreshing if needed.
    pub async fn access_token(&self) -> Result<String, AppError> {
        self.current(true)
            .await?
            .map(|c| c.access_token)
            .ok_or(AppError::NoCredential)
    }

    /// Force a refresh, e.g. after the API rejected the access token.
    ///
    /// `rejected_token` is the token the caller used. When the stored token
    /// already differs, another task refreshed in the meantime and the stored
    /// credential is returned as is.
    pub async fn refresh_rejected(&self, rejected_token: &str) -> Result<Credential, AppError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(stored) = self.db.get_credential().await? {
            if stored.access_token != rejected_token && !stored.is_expired(Utc::now()) {
                return Ok(stored);
            }
        }

        self.refresh_locked().await
    }

    /// Unconditionally refresh the stored credential.
    pub async fn refresh(&self) -> Result<Credential, AppError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh with `refresh_lock` already held.
    async fn refresh_locked(&self) -> Result<Credential, AppError> {
        let stored = self.db.get_credential().await?.ok_or_else(|| {
            tracing::error!(login_url = %self.login_url, "No credential to refresh");
            AppError::NoCredential
        })?;

        match self.client.refresh_token(&stored.refresh_token).await? {
            TokenReply::Granted(token) => {
                let credential = token.into_credential(Utc::now(), Some(&stored.refresh_token));
                self.db.set_credential(&credential).await?;
                tracing::info!(expires_on = %credential.expires_on, "Access token refreshed");
                Ok(credential)
            }
            TokenReply::Rejected { status, body } => {
                tracing::error!(status, body = %body, "Refresh token rejected");
                Err(AppError::AuthExchange { status, body })
            }
            TokenReply::Failed { status, body } => {
                tracing::error!(status, body = %body, "Access token refresh failed");
                Err(AppError::CatalogApi(format!(
                    "Token refresh failed: HTTP {}: {}",
                    status, body
                )))
            }
        }
    }
}
