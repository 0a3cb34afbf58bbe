// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync progress and sync metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Progress of the sync currently running. Absent (`None`) when idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub running: bool,
    /// Number of artists processed so far
    pub current_artist_index: usize,
    pub total_artists: usize,
    /// Number of shows processed so far
    pub current_show_index: usize,
    pub total_shows: usize,
}

impl SyncStatus {
    pub fn started(total_artists: usize, total_shows: usize) -> Self {
        Self {
            running: true,
            current_artist_index: 0,
            total_artists,
            current_show_index: 0,
            total_shows,
        }
    }
}

/// One entity whose releases or episodes could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity_id: String,
    pub entity_name: String,
    /// HTTP status of the failing call, if the catalog answered at all
    pub status: Option<u16>,
    pub message: String,
}

/// Singleton summary of the last sync. Replaced wholesale after every sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub last_execution_at: DateTime<Utc>,
    /// Only advances when a sync finishes without any entity failure
    pub last_successful_execution_at: Option<DateTime<Utc>>,
    pub nb_artists: usize,
    pub nb_releases: usize,
    pub nb_shows: usize,
    pub nb_episodes: usize,
    #[serde(default)]
    pub artist_errors: Vec<EntityFailure>,
    #[serde(default)]
    pub show_errors: Vec<EntityFailure>,
}

impl SyncMetadata {
    pub fn has_errors(&self) -> bool {
        !self.artist_errors.is_empty() || !self.show_errors.is_empty()
    }
}

/// Which half of the mirror a sync refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    #[default]
    All,
    ReleasesOnly,
    EpisodesOnly,
}

impl SyncScope {
    pub fn includes_releases(self) -> bool {
        matches!(self, SyncScope::All | SyncScope::ReleasesOnly)
    }

    pub fn includes_episodes(self) -> bool {
        matches!(self, SyncScope::All | SyncScope::EpisodesOnly)
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncScope::All => write!(f, "all"),
            SyncScope::ReleasesOnly => write!(f, "releases"),
            SyncScope::EpisodesOnly => write!(f, "episodes"),
        }
    }
}

impl FromStr for SyncScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SyncScope::All),
            "releases" => Ok(SyncScope::ReleasesOnly),
            "episodes" => Ok(SyncScope::EpisodesOnly),
            other => Err(format!("unknown sync scope '{}'", other)),
        }
    }
}
