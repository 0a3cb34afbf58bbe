// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestrator.
//!
//! Runs at most one sync at a time. A sync walks every followed artist and
//! show in order, fetches their recent releases or episodes, stores the new
//! ones, publishes progress after each entity and finally rewrites the sync
//! metadata. Per-entity fetch failures are recorded and skipped; credential
//! failures abort the sync.

use crate::config::Config;
use crate::db::MirrorDb;
use crate::error::AppError;
use crate::models::{
    Artist, EntityFailure, FollowedEntity, FollowedKind, ItemKind, Show, SyncMetadata, SyncScope,
    SyncStatus,
};
use crate::services::catalog::CatalogClient;
use crate::services::credentials::CredentialStore;
use crate::services::ingest::Ingestor;
use crate::services::pagination::{Fetched, PaginatedFetcher};
use crate::services::resource::{
    ArtistReleases, FollowedArtists, Resource, SavedShows, ShowEpisodes,
};
use crate::services::retry::{RetryController, RetryPolicy};
use crate::services::status::{StatusBroadcaster, Subscription};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Called once a sync has written its metadata.
pub trait SyncFinishedHook: Send + Sync {
    fn on_sync_finished(&self, metadata: &SyncMetadata);
}

/// Default hook: log a summary.
pub struct LogSyncFinished;

impl SyncFinishedHook for LogSyncFinished {
    fn on_sync_finished(&self, metadata: &SyncMetadata) {
        if metadata.has_errors() {
            tracing::warn!(
                artist_errors = metadata.artist_errors.len(),
                show_errors = metadata.show_errors.len(),
                "Sync finished with entity errors"
            );
            return;
        }
        tracing::info!(
            nb_artists = metadata.nb_artists,
            nb_releases = metadata.nb_releases,
            nb_shows = metadata.nb_shows,
            nb_episodes = metadata.nb_episodes,
            "Sync finished"
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Another sync was in progress; nothing was done
    AlreadyRunning,
    Completed(SyncMetadata),
    /// Stopped by `cancel()`; metadata covers the work done so far
    Cancelled(SyncMetadata),
}

/// Restores Idle and publishes the final status on every exit path.
struct RunningGuard<'a> {
    inner: &'a SyncInner,
    token: CancellationToken,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *lock_cancel(&self.inner.cancel) = None;
        self.inner.status.finish();
        self.inner.running.store(false, Ordering::Release);
    }
}

fn lock_cancel(
    cancel: &StdMutex<Option<CancellationToken>>,
) -> MutexGuard<'_, Option<CancellationToken>> {
    cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SyncInner {
    config: Config,
    db: MirrorDb,
    catalog: CatalogClient,
    credentials: CredentialStore,
    fetcher: PaginatedFetcher,
    ingestor: Ingestor,
    status: StatusBroadcaster,
    hook: Arc<dyn SyncFinishedHook>,
    running: AtomicBool,
    /// Token of the operation holding the running flag
    cancel: StdMutex<Option<CancellationToken>>,
}

#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncInner>,
}

impl SyncService {
    pub fn new(
        config: Config,
        db: MirrorDb,
        catalog: CatalogClient,
        credentials: CredentialStore,
        hook: Arc<dyn SyncFinishedHook>,
    ) -> Self {
        let retry = RetryController::new(
            catalog.clone(),
            credentials.clone(),
            RetryPolicy::from_config(&config),
        );

        Self {
            inner: Arc::new(SyncInner {
                fetcher: PaginatedFetcher::new(retry),
                ingestor: Ingestor::new(db.clone(), config.newer_than_days),
                status: StatusBroadcaster::new(config.status_queue_capacity),
                config,
                db,
                catalog,
                credentials,
                hook,
                running: AtomicBool::new(false),
                cancel: StdMutex::new(None),
            }),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Progress of the running sync, `None` when idle.
    pub fn status(&self) -> Option<SyncStatus> {
        self.inner.status.current()
    }

    pub fn subscribe(&self) -> Subscription {
        self.inner.status.subscribe()
    }

    pub fn unsubscribe(&self, id: u64) {
        self.inner.status.unsubscribe(id)
    }

    pub async fn metadata(&self) -> Result<Option<SyncMetadata>, AppError> {
        self.inner.db.get_metadata().await
    }

    /// Ask the running sync to stop after the current step: the current
    /// followed list or the current entity. Returns false when nothing is
    /// running.
    pub fn cancel(&self) -> bool {
        match lock_cancel(&self.inner.cancel).as_ref() {
            Some(token) => {
                tracing::info!("Sync cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let token = CancellationToken::new();
        *lock_cancel(&self.inner.cancel) = Some(token.clone());
        Some(RunningGuard {
            inner: &self.inner,
            token,
        })
    }

    /// Refresh the stored followed list of one kind.
    ///
    /// The stored set is replaced only when every page was fetched; otherwise
    /// it is left untouched and `None` is returned.
    pub async fn refresh_followed(&self, kind: FollowedKind) -> Result<Option<usize>, AppError> {
        let catalog = self.inner.catalog.clone();
        let fetched = match kind {
            FollowedKind::Artists => {
                self.inner
                    .fetcher
                    .fetch_all(&FollowedArtists::new(catalog), None)
                    .await?
            }
            FollowedKind::Shows => {
                self.inner
                    .fetcher
                    .fetch_all(&SavedShows::new(catalog), None)
                    .await?
            }
        };

        if let Some(failure) = &fetched.failure {
            tracing::error!(
                kind = %kind,
                status = ?failure.status,
                error = %failure.message,
                "Followed list incomplete, keeping stored list"
            );
            return Ok(None);
        }

        let count = match kind {
            FollowedKind::Artists => {
                let artists: Vec<Artist> = decode_entities(fetched.items, kind);
                let count = artists.len();
                self.inner.db.replace_artists(artists).await?;
                count
            }
            FollowedKind::Shows => {
                let shows: Vec<Show> = decode_entities(fetched.items, kind);
                let count = shows.len();
                self.inner.db.replace_shows(shows).await?;
                count
            }
        };

        tracing::info!(kind = %kind, count, "Followed list refreshed");
        Ok(Some(count))
    }

    /// Run a sync unless one is already in progress.
    pub async fn start_full_sync(&self, scope: SyncScope) -> Result<SyncOutcome, AppError> {
        let Some(guard) = self.try_begin() else {
            tracing::warn!(scope = %scope, "Sync already running, ignoring request");
            return Ok(SyncOutcome::AlreadyRunning);
        };
        let result = self.run_with_token(scope, Utc::now(), &guard.token).await;
        log_abort(&result, scope);
        result
    }

    /// Refresh the followed lists covered by `scope`, then sync, as one
    /// single-flight operation.
    pub async fn full_refresh(&self, scope: SyncScope) -> Result<SyncOutcome, AppError> {
        let Some(guard) = self.try_begin() else {
            tracing::warn!(scope = %scope, "Sync already running, ignoring refresh");
            return Ok(SyncOutcome::AlreadyRunning);
        };
        let result = self.refresh_then_run(scope, &guard.token).await;
        log_abort(&result, scope);
        result
    }

    async fn refresh_then_run(
        &self,
        scope: SyncScope,
        token: &CancellationToken,
    ) -> Result<SyncOutcome, AppError> {
        let started_at = Utc::now();
        // Totals are unknown until the lists are loaded.
        self.inner.status.publish(SyncStatus::started(0, 0));

        if scope.includes_releases() && !token.is_cancelled() {
            self.refresh_followed(FollowedKind::Artists).await?;
        }
        if scope.includes_episodes() && !token.is_cancelled() {
            self.refresh_followed(FollowedKind::Shows).await?;
        }
        self.run_with_token(scope, started_at, token).await
    }

    async fn run_with_token(
        &self,
        scope: SyncScope,
        started_at: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<SyncOutcome, AppError> {
        let inner = &self.inner;

        let artists = if scope.includes_releases() {
            inner.db.followed(FollowedKind::Artists).await?
        } else {
            Vec::new()
        };
        let shows = if scope.includes_episodes() {
            inner.db.followed(FollowedKind::Shows).await?
        } else {
            Vec::new()
        };

        tracing::info!(
            scope = %scope,
            artists = artists.len(),
            shows = shows.len(),
            "Sync started"
        );
        inner
            .status
            .publish(SyncStatus::started(artists.len(), shows.len()));

        inner.ingestor.expire_stale(started_at).await?;
        let cutoff = inner.ingestor.cutoff(started_at);

        let mut artist_errors = Vec::new();
        let mut show_errors = Vec::new();
        let mut cancelled = token.is_cancelled();

        if scope.includes_releases() && !cancelled {
            let releases = ArtistReleases::new(
                inner.catalog.clone(),
                inner.config.include_groups.clone(),
                inner.config.albums_request_limit,
                cutoff,
            );
            cancelled = self
                .process_entities(
                    &artists,
                    &releases,
                    ItemKind::Releases,
                    &mut artist_errors,
                    token,
                    |status, done| status.current_artist_index = done,
                )
                .await?;
        }

        if scope.includes_episodes() && !cancelled {
            let episodes = ShowEpisodes::new(
                inner.catalog.clone(),
                inner.config.albums_request_limit,
                cutoff,
            );
            cancelled = self
                .process_entities(
                    &shows,
                    &episodes,
                    ItemKind::Episodes,
                    &mut show_errors,
                    token,
                    |status, done| status.current_show_index = done,
                )
                .await?;
        }

        let previous = inner.db.get_metadata().await?;
        let clean = !cancelled && artist_errors.is_empty() && show_errors.is_empty();
        let metadata = SyncMetadata {
            last_execution_at: started_at,
            last_successful_execution_at: if clean {
                Some(started_at)
            } else {
                previous.and_then(|m| m.last_successful_execution_at)
            },
            nb_artists: inner.db.count_followed(FollowedKind::Artists).await?,
            nb_releases: inner.db.count_items(ItemKind::Releases).await?,
            nb_shows: inner.db.count_followed(FollowedKind::Shows).await?,
            nb_episodes: inner.db.count_items(ItemKind::Episodes).await?,
            artist_errors,
            show_errors,
        };
        inner.db.set_metadata(&metadata).await?;
        inner.hook.on_sync_finished(&metadata);

        if cancelled {
            tracing::warn!("Sync cancelled");
            Ok(SyncOutcome::Cancelled(metadata))
        } else {
            Ok(SyncOutcome::Completed(metadata))
        }
    }

    /// Fetch and store items for each entity in order. Returns true if the
    /// sync was cancelled before all entities were processed.
    async fn process_entities<F>(
        &self,
        entities: &[FollowedEntity],
        resource: &dyn Resource,
        kind: ItemKind,
        errors: &mut Vec<EntityFailure>,
        token: &CancellationToken,
        advance: F,
    ) -> Result<bool, AppError>
    where
        F: Fn(&mut SyncStatus, usize),
    {
        let inner = &self.inner;
        let delay = inner.config.request_delay;

        for (index, entity) in entities.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(true);
            }

            let Fetched { items, failure } =
                inner.fetcher.fetch_all(resource, Some(entity)).await?;
            inner.ingestor.ingest(items, entity, kind, Utc::now()).await?;

            if let Some(failure) = failure {
                errors.push(EntityFailure {
                    entity_id: entity.id().to_string(),
                    entity_name: entity.name().to_string(),
                    status: failure.status,
                    message: failure.message,
                });
            }

            inner.status.update(|status| advance(status, index + 1));

            if delay > Duration::ZERO && index + 1 < entities.len() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => return Ok(true),
                }
            }
        }

        Ok(false)
    }
}

fn log_abort(result: &Result<SyncOutcome, AppError>, scope: SyncScope) {
    if let Err(e) = result {
        tracing::error!(error = %e, scope = %scope, "Sync aborted");
    }
}

/// Decode raw followed-list items, skipping malformed ones.
fn decode_entities<T: serde::de::DeserializeOwned>(
    items: Vec<serde_json::Value>,
    kind: FollowedKind,
) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Skipping malformed followed entity");
                None
            }
        })
        .collect()
}
