// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Release-Tracker: keep a local mirror of followed artists and shows
//!
//! This crate syncs a user's followed artists and saved shows, and their
//! recent releases and episodes, from an OAuth-protected catalog API into a
//! local store, and serves the mirror over a small JSON API.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use chrono::{DateTime, Utc};
use config::Config;
use dashmap::DashMap;
use db::MirrorDb;
use services::SyncService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: MirrorDb,
    pub sync: SyncService,
    /// OAuth states handed out by `/login`, with their issue time
    pub oauth_states: DashMap<String, DateTime<Utc>>,
}

impl AppState {
    pub fn new(config: Config, db: MirrorDb, sync: SyncService) -> Self {
        Self {
            config,
            db,
            sync,
            oauth_states: DashMap::new(),
        }
    }
}
