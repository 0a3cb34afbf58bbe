// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the mirror.

pub mod credential;
pub mod entity;
pub mod item;
pub mod sync;

pub use credential::Credential;
pub use entity::{Artist, FollowedEntity, FollowedKind, Show};
pub use item::{DatePrecision, DateSorting, ItemKind, ReleaseItem};
pub use sync::{EntityFailure, SyncMetadata, SyncScope, SyncStatus};
