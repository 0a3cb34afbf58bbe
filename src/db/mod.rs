// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (JSON document collections).

pub mod store;

pub use store::MirrorDb;

/// Collection names as constants. Each maps to `<name>.json` under the data directory.
pub mod collections {
    /// Singleton OAuth credential of the connected user
    pub const CREDENTIAL: &str = "credential";
    pub const ARTISTS: &str = "artists";
    pub const SHOWS: &str = "shows";
    pub const RELEASES: &str = "releases";
    pub const EPISODES: &str = "episodes";
    /// Singleton sync metadata
    pub const METADATA: &str = "metadata";
}
