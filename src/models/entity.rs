// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Followed artists and shows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A followed artist, as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// Remaining provider attributes (genres, images, popularity...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A saved show (podcast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Either kind of followed entity. Releases hang off artists, episodes off shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FollowedEntity {
    Artist(Artist),
    Show(Show),
}

impl FollowedEntity {
    pub fn id(&self) -> &str {
        match self {
            FollowedEntity::Artist(a) => &a.id,
            FollowedEntity::Show(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FollowedEntity::Artist(a) => &a.name,
            FollowedEntity::Show(s) => &s.name,
        }
    }
}

/// Which followed list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowedKind {
    Artists,
    Shows,
}

impl fmt::Display for FollowedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowedKind::Artists => write!(f, "artists"),
            FollowedKind::Shows => write!(f, "shows"),
        }
    }
}
