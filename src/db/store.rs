// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mirror storage with typed operations.
//!
//! Provides high-level operations for:
//! - Credential (the connected user's OAuth tokens)
//! - Artists and Shows (followed entities, replaced wholesale)
//! - Releases and Episodes (append-only, deleted by expiry)
//! - Metadata (summary of the last sync)
//!
//! Every collection is held in memory behind one lock and mirrored to a JSON
//! file. A write replaces the file atomically (temp file, then rename).

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    Artist, Credential, DateSorting, FollowedEntity, FollowedKind, ItemKind, ReleaseItem, Show,
    SyncMetadata,
};
use chrono::{NaiveDate, TimeDelta};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Collections {
    credential: Option<Credential>,
    artists: Vec<Artist>,
    shows: Vec<Show>,
    releases: Vec<ReleaseItem>,
    episodes: Vec<ReleaseItem>,
    metadata: Option<SyncMetadata>,
}

impl Collections {
    fn items(&self, kind: ItemKind) -> &Vec<ReleaseItem> {
        match kind {
            ItemKind::Releases => &self.releases,
            ItemKind::Episodes => &self.episodes,
        }
    }

    fn items_mut(&mut self, kind: ItemKind) -> &mut Vec<ReleaseItem> {
        match kind {
            ItemKind::Releases => &mut self.releases,
            ItemKind::Episodes => &mut self.episodes,
        }
    }
}

fn item_collection(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Releases => collections::RELEASES,
        ItemKind::Episodes => collections::EPISODES,
    }
}

/// Local mirror database.
#[derive(Clone)]
pub struct MirrorDb {
    inner: Arc<RwLock<Collections>>,
    /// `None` keeps everything in memory (tests)
    dir: Option<PathBuf>,
}

impl MirrorDb {
    /// Open (or create) the mirror stored under `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Database(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let data = Collections {
            credential: load(&dir, collections::CREDENTIAL).await?,
            artists: load(&dir, collections::ARTISTS).await?.unwrap_or_default(),
            shows: load(&dir, collections::SHOWS).await?.unwrap_or_default(),
            releases: load(&dir, collections::RELEASES).await?.unwrap_or_default(),
            episodes: load(&dir, collections::EPISODES).await?.unwrap_or_default(),
            metadata: load(&dir, collections::METADATA).await?,
        };

        tracing::info!(
            dir = %dir.display(),
            artists = data.artists.len(),
            shows = data.shows.len(),
            releases = data.releases.len(),
            episodes = data.episodes.len(),
            "Opened mirror database"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(data)),
            dir: Some(dir),
        })
    }

    /// Create an empty mirror that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Collections::default())),
            dir: None,
        }
    }

    async fn persist<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), AppError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| AppError::Database(format!("Failed to encode {}: {}", name, e)))?;

        let path = dir.join(format!("{}.json", name));
        let tmp = dir.join(format!("{}.json.tmp", name));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::Database(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Database(format!("Failed to replace {}: {}", path.display(), e)))
    }

    // ─── Credential Operations ───────────────────────────────────

    pub async fn get_credential(&self) -> Result<Option<Credential>, AppError> {
        Ok(self.inner.read().await.credential.clone())
    }

    /// Store the credential, replacing any previous one.
    pub async fn set_credential(&self, credential: &Credential) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        self.persist(collections::CREDENTIAL, credential).await?;
        data.credential = Some(credential.clone());
        Ok(())
    }

    // ─── Followed Entity Operations ──────────────────────────────

    pub async fn artists(&self) -> Result<Vec<Artist>, AppError> {
        Ok(self.inner.read().await.artists.clone())
    }

    pub async fn shows(&self) -> Result<Vec<Show>, AppError> {
        Ok(self.inner.read().await.shows.clone())
    }

    /// Replace the whole followed artist set.
    pub async fn replace_artists(&self, artists: Vec<Artist>) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        self.persist(collections::ARTISTS, &artists).await?;
        data.artists = artists;
        Ok(())
    }

    /// Replace the whole saved show set.
    pub async fn replace_shows(&self, shows: Vec<Show>) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        self.persist(collections::SHOWS, &shows).await?;
        data.shows = shows;
        Ok(())
    }

    /// Followed entities of one kind, in stored order.
    pub async fn followed(&self, kind: FollowedKind) -> Result<Vec<FollowedEntity>, AppError> {
        let data = self.inner.read().await;
        let entities = match kind {
            FollowedKind::Artists => data
                .artists
                .iter()
                .cloned()
                .map(FollowedEntity::Artist)
                .collect(),
            FollowedKind::Shows => data.shows.iter().cloned().map(FollowedEntity::Show).collect(),
        };
        Ok(entities)
    }

    pub async fn count_followed(&self, kind: FollowedKind) -> Result<usize, AppError> {
        let data = self.inner.read().await;
        Ok(match kind {
            FollowedKind::Artists => data.artists.len(),
            FollowedKind::Shows => data.shows.len(),
        })
    }

    // ─── Item Operations ─────────────────────────────────────────

    pub async fn items(&self, kind: ItemKind) -> Result<Vec<ReleaseItem>, AppError> {
        Ok(self.inner.read().await.items(kind).clone())
    }

    pub async fn item_ids(&self, kind: ItemKind) -> Result<HashSet<String>, AppError> {
        let data = self.inner.read().await;
        Ok(data.items(kind).iter().map(|i| i.id.clone()).collect())
    }

    pub async fn count_items(&self, kind: ItemKind) -> Result<usize, AppError> {
        Ok(self.inner.read().await.items(kind).len())
    }

    /// Append a batch of items in one write.
    ///
    /// Ids already present are skipped so the collection never holds two
    /// items with the same id. Returns the number actually inserted.
    pub async fn insert_items(
        &self,
        kind: ItemKind,
        items: Vec<ReleaseItem>,
    ) -> Result<usize, AppError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut data = self.inner.write().await;
        let mut known: HashSet<String> = data.items(kind).iter().map(|i| i.id.clone()).collect();

        let mut updated = data.items(kind).clone();
        let before = updated.len();
        for item in items {
            if known.insert(item.id.clone()) {
                updated.push(item);
            }
        }
        let inserted = updated.len() - before;
        if inserted == 0 {
            return Ok(0);
        }

        self.persist(item_collection(kind), &updated).await?;
        *data.items_mut(kind) = updated;
        Ok(inserted)
    }

    /// Delete items whose release date is strictly before `cutoff` (UTC seconds).
    pub async fn remove_items_older_than(
        &self,
        kind: ItemKind,
        cutoff: i64,
    ) -> Result<usize, AppError> {
        let mut data = self.inner.write().await;
        let kept: Vec<ReleaseItem> = data
            .items(kind)
            .iter()
            .filter(|i| i.release_date_timestamp >= cutoff)
            .cloned()
            .collect();
        let removed = data.items(kind).len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        self.persist(item_collection(kind), &kept).await?;
        *data.items_mut(kind) = kept;
        Ok(removed)
    }

    /// Items whose chosen timestamp falls on `date` (UTC), newest first.
    pub async fn items_for_date(
        &self,
        date: NaiveDate,
        kind: ItemKind,
        sorting: DateSorting,
    ) -> Result<Vec<ReleaseItem>, AppError> {
        let start = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| AppError::BadRequest(format!("Invalid date {}", date)))?;
        let end = start + TimeDelta::days(1).num_seconds();

        let data = self.inner.read().await;
        let mut items: Vec<ReleaseItem> = data
            .items(kind)
            .iter()
            .filter(|i| {
                let ts = i.timestamp_for(sorting);
                ts >= start && ts < end
            })
            .cloned()
            .collect();
        items.sort_by_key(|i| std::cmp::Reverse(i.timestamp_for(sorting)));
        Ok(items)
    }

    // ─── Metadata Operations ─────────────────────────────────────

    pub async fn get_metadata(&self) -> Result<Option<SyncMetadata>, AppError> {
        Ok(self.inner.read().await.metadata.clone())
    }

    /// Replace the sync metadata singleton.
    pub async fn set_metadata(&self, metadata: &SyncMetadata) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        self.persist(collections::METADATA, metadata).await?;
        data.metadata = Some(metadata.clone());
        Ok(())
    }
}

async fn load<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Option<T>, AppError> {
    let path = dir.join(format!("{}.json", name));
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::Database(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| AppError::Database(format!("Corrupt collection {}: {}", path.display(), e)))
}
