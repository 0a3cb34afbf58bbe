// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Catalog OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::SyncScope;
use crate::services::SyncOutcome;
use crate::AppState;

/// How long a state handed out by `/login` stays valid.
const OAUTH_STATE_MAX_AGE_MINUTES: i64 = 10;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login))
        .route("/auth", get(auth_callback))
}

/// Start OAuth flow - redirect to the provider consent page.
async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    let now = Utc::now();
    let max_age = Duration::minutes(OAUTH_STATE_MAX_AGE_MINUTES);
    state
        .oauth_states
        .retain(|_, issued_at| now - *issued_at < max_age);

    let oauth_state = uuid::Uuid::new_v4().to_string();
    state.oauth_states.insert(oauth_state.clone(), now);

    let auth_url = state.sync.credentials().authorize_url(&oauth_state);
    tracing::info!(client_id = %state.config.client_id, "Starting OAuth flow, redirecting to provider");

    Redirect::temporary(&auth_url)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct ConnectedResponse {
    pub status: String,
    pub expires_on: String,
    pub sync_started: bool,
}

/// Take a state handed out by `/login`. Each state can be used once.
fn consume_state(state: &AppState, oauth_state: &str) -> bool {
    match state.oauth_states.remove(oauth_state) {
        Some((_, issued_at)) => {
            Utc::now() - issued_at < Duration::minutes(OAUTH_STATE_MAX_AGE_MINUTES)
        }
        None => false,
    }
}

/// OAuth callback - exchange the code, then refresh the whole mirror in the background.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from provider");
        return Err(AppError::BadRequest(format!("Authorization denied: {}", error)));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state".to_string()))?;
    if !consume_state(&state, &oauth_state) {
        tracing::warn!("Unknown or expired OAuth state");
        return Err(AppError::BadRequest("Invalid or expired state".to_string()));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let Some(credential) = state.sync.credentials().exchange(&code).await? else {
        // Unexpected provider answer: start over.
        return Ok(Redirect::temporary("/login").into_response());
    };

    let sync_started = !state.sync.is_running();
    let sync = state.sync.clone();
    tokio::spawn(async move {
        match sync.full_refresh(SyncScope::All).await {
            Ok(SyncOutcome::AlreadyRunning) => {
                tracing::info!("Post-login sync skipped, a sync is already running")
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Post-login sync failed"),
        }
    });

    Ok(Json(ConnectedResponse {
        status: "connected".to_string(),
        expires_on: credential.expires_on.to_rfc3339(),
        sync_started,
    })
    .into_response())
}
