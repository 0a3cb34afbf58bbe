// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON API over the mirror and the sync engine.

use crate::error::{AppError, Result};
use crate::models::{
    Artist, DateSorting, ItemKind, ReleaseItem, Show, SyncMetadata, SyncScope, SyncStatus,
};
use crate::services::SyncOutcome;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/metadata", get(get_metadata))
        .route("/api/artists", get(get_artists))
        .route("/api/shows", get(get_shows))
        .route("/api/releases", get(get_releases))
        .route("/api/episodes", get(get_episodes))
        .route("/api/latest", get(get_latest))
        .route("/api/refresh", post(start_refresh))
        .route("/api/cancel", post(cancel_sync))
}

// ─── Sync State ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub running: bool,
    /// Progress of the running sync, absent when idle
    pub status: Option<SyncStatus>,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.sync.is_running(),
        status: state.sync.status(),
    })
}

/// Summary of the last sync; 404 before the first one.
async fn get_metadata(State(state): State<Arc<AppState>>) -> Result<Json<SyncMetadata>> {
    state
        .sync
        .metadata()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No sync has run yet".to_string()))
}

// ─── Mirror Contents ─────────────────────────────────────────

async fn get_artists(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Artist>>> {
    Ok(Json(state.db.artists().await?))
}

async fn get_shows(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Show>>> {
    Ok(Json(state.db.shows().await?))
}

async fn get_releases(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ReleaseItem>>> {
    Ok(Json(state.db.items(ItemKind::Releases).await?))
}

async fn get_episodes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ReleaseItem>>> {
    Ok(Json(state.db.items(ItemKind::Episodes).await?))
}

#[derive(Deserialize)]
pub struct LatestParams {
    /// `YYYY-MM-DD`, today (UTC) when absent
    date: Option<String>,
    kind: Option<String>,
    sort: Option<String>,
}

#[derive(Serialize)]
pub struct LatestResponse {
    pub date: NaiveDate,
    pub kind: ItemKind,
    pub sorting: DateSorting,
    pub items: Vec<ReleaseItem>,
    /// Last sync summary, absent before the first sync
    pub metadata: Option<SyncMetadata>,
}

/// Items released (or added) on one day.
async fn get_latest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestParams>,
) -> Result<Json<LatestResponse>> {
    let date = match params.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))?,
        None => Utc::now().date_naive(),
    };
    let kind = match params.kind.as_deref() {
        Some(raw) => raw.parse::<ItemKind>().map_err(AppError::BadRequest)?,
        None => ItemKind::Releases,
    };
    let sorting = match params.sort.as_deref() {
        Some(raw) => raw.parse::<DateSorting>().map_err(AppError::BadRequest)?,
        None => state.config.default_sorting,
    };

    let items = state.db.items_for_date(date, kind, sorting).await?;
    let metadata = state.sync.metadata().await?;
    Ok(Json(LatestResponse {
        date,
        kind,
        sorting,
        items,
        metadata,
    }))
}

// ─── Sync Control ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RefreshParams {
    scope: Option<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub started: bool,
    pub scope: SyncScope,
}

/// Start a full refresh in the background. 409 if a sync is already running.
async fn start_refresh(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Result<(StatusCode, Json<RefreshResponse>)> {
    let scope = match params.scope.as_deref() {
        Some(raw) => raw.parse::<SyncScope>().map_err(AppError::BadRequest)?,
        None => SyncScope::All,
    };

    if state.sync.is_running() {
        return Ok((
            StatusCode::CONFLICT,
            Json(RefreshResponse {
                started: false,
                scope,
            }),
        ));
    }

    let sync = state.sync.clone();
    tokio::spawn(async move {
        match sync.full_refresh(scope).await {
            Ok(SyncOutcome::AlreadyRunning) => {
                tracing::info!(scope = %scope, "Requested sync skipped, a sync is already running")
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, scope = %scope, "Requested sync failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            started: true,
            scope,
        }),
    ))
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

async fn cancel_sync(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.sync.cancel(),
    })
}
