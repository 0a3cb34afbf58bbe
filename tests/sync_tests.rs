// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end sync behavior against a mock catalog.

use chrono::Utc;
use release_tracker::db::MirrorDb;
use release_tracker::error::AppError;
use release_tracker::models::{ItemKind, SyncMetadata, SyncScope};
use release_tracker::services::SyncOutcome;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

async fn mount_albums(server: &MockServer, artist_id: &str, albums: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/artists/{}/albums", artist_id)))
        .and(query_param("include_groups", "album"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::page(albums, None)))
        .mount(server)
        .await;
}

async fn wait_until_running(sync: &release_tracker::services::SyncService) {
    for _ in 0..200 {
        if sync.is_running() && sync.status().is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("sync never started");
}

#[tokio::test]
async fn test_end_to_end_stores_recent_release_only() {
    let server = MockServer::start().await;
    mount_albums(
        &server,
        "a1",
        vec![common::album("recent", 5), common::album("stale", 60)],
    )
    .await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("a1")]).await.unwrap();
    let sync = common::sync_service(&config, &db);

    let outcome = sync.start_full_sync(SyncScope::All).await.unwrap();
    let SyncOutcome::Completed(metadata) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };

    assert_eq!(metadata.nb_artists, 1);
    assert_eq!(metadata.nb_releases, 1);
    assert_eq!(metadata.nb_shows, 0);
    assert!(metadata.artist_errors.is_empty());
    assert_eq!(
        metadata.last_successful_execution_at,
        Some(metadata.last_execution_at)
    );

    let releases = db.items(ItemKind::Releases).await.unwrap();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].id, "recent");
    assert_eq!(releases[0].parent_entity_id, "a1");
    assert!(!releases[0].extra.contains_key("available_markets"));

    assert_eq!(db.get_metadata().await.unwrap(), Some(metadata));
    assert!(!sync.is_running());
    assert!(sync.status().is_none());
}

#[tokio::test]
async fn test_second_sync_is_idempotent() {
    let server = MockServer::start().await;
    mount_albums(&server, "a1", vec![common::album("r1", 1), common::album("r2", 2)]).await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("a1")]).await.unwrap();
    let sync = common::sync_service(&config, &db);

    sync.start_full_sync(SyncScope::All).await.unwrap();
    sync.start_full_sync(SyncScope::All).await.unwrap();

    assert_eq!(db.count_items(ItemKind::Releases).await.unwrap(), 2);
}

#[tokio::test]
async fn test_failed_entity_keeps_last_success() {
    let server = MockServer::start().await;
    mount_albums(&server, "good", vec![common::album("r1", 1)]).await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("good")]).await.unwrap();
    let sync = common::sync_service(&config, &db);

    let SyncOutcome::Completed(first) = sync.start_full_sync(SyncScope::All).await.unwrap() else {
        panic!("first sync did not complete");
    };
    let first_success = first.last_successful_execution_at;
    assert!(first_success.is_some());

    // A second artist whose albums cannot be fetched.
    Mock::given(method("GET"))
        .and(path("/v1/artists/broken/albums"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;
    db.replace_artists(vec![common::artist("broken"), common::artist("good")])
        .await
        .unwrap();

    let SyncOutcome::Completed(second) = sync.start_full_sync(SyncScope::All).await.unwrap()
    else {
        panic!("second sync did not complete");
    };

    assert_eq!(second.artist_errors.len(), 1);
    let failure = &second.artist_errors[0];
    assert_eq!(failure.entity_id, "broken");
    assert_eq!(failure.entity_name, "Artist broken");
    assert_eq!(failure.status, Some(500));
    assert_eq!(second.last_successful_execution_at, first_success);
    assert!(second.last_execution_at >= first.last_execution_at);
    // The healthy artist after the broken one was still processed.
    assert_eq!(second.nb_releases, 1);
}

#[tokio::test]
async fn test_concurrent_sync_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/albums"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::page(vec![common::album("r1", 1)], None))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("a1")]).await.unwrap();
    let sync = common::sync_service(&config, &db);

    let first = tokio::spawn({
        let sync = sync.clone();
        async move { sync.start_full_sync(SyncScope::All).await }
    });
    wait_until_running(&sync).await;
    let before = sync.status();
    assert!(before.is_some());

    let second = sync.start_full_sync(SyncScope::All).await.unwrap();
    assert_eq!(second, SyncOutcome::AlreadyRunning);
    assert_eq!(
        sync.full_refresh(SyncScope::All).await.unwrap(),
        SyncOutcome::AlreadyRunning
    );
    assert_eq!(sync.status(), before);

    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, SyncOutcome::Completed(_)));
    assert_eq!(db.count_items(ItemKind::Releases).await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_credential_aborts_sync() {
    let server = MockServer::start().await;
    let config = common::test_config(&server);
    let db = MirrorDb::in_memory();
    db.replace_artists(vec![common::artist("a1")]).await.unwrap();
    let sync = common::sync_service(&config, &db);
    let mut events = sync.subscribe();

    let err = sync.start_full_sync(SyncScope::All).await.unwrap_err();
    assert!(matches!(err, AppError::NoCredential));

    assert!(db.get_metadata().await.unwrap().is_none());
    assert!(!sync.is_running());

    // Started, then the final not-running snapshot.
    assert!(events.receiver.recv().await.unwrap().running);
    assert!(!events.receiver.recv().await.unwrap().running);
}

#[tokio::test]
async fn test_progress_is_published_per_entity() {
    let server = MockServer::start().await;
    mount_albums(&server, "a1", vec![]).await;
    mount_albums(&server, "a2", vec![]).await;
    Mock::given(method("GET"))
        .and(path("/v1/shows/s1/episodes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::page(vec![common::episode("e1", 3)], None)),
        )
        .mount(&server)
        .await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("a1"), common::artist("a2")])
        .await
        .unwrap();
    db.replace_shows(vec![common::show("s1")]).await.unwrap();
    let sync = common::sync_service(&config, &db);
    let mut events = sync.subscribe();

    let SyncOutcome::Completed(metadata) = sync.start_full_sync(SyncScope::All).await.unwrap()
    else {
        panic!("sync did not complete");
    };
    assert_eq!(metadata.nb_episodes, 1);

    let mut seen = Vec::new();
    while let Ok(status) = events.receiver.try_recv() {
        seen.push(status);
    }

    let artist_steps: Vec<_> = seen.iter().map(|s| s.current_artist_index).collect();
    assert_eq!(artist_steps, [0, 1, 2, 2, 2]);
    let last = seen.last().unwrap();
    assert!(!last.running);
    assert_eq!((last.total_artists, last.total_shows), (2, 1));
    assert_eq!(last.current_show_index, 1);
}

#[tokio::test]
async fn test_cancel_stops_between_entities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/slow/albums"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::page(vec![common::album("r1", 1)], None))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/never/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::page(vec![], None)))
        .expect(0)
        .mount(&server)
        .await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("slow"), common::artist("never")])
        .await
        .unwrap();
    let sync = common::sync_service(&config, &db);

    let running = tokio::spawn({
        let sync = sync.clone();
        async move { sync.start_full_sync(SyncScope::All).await }
    });
    wait_until_running(&sync).await;
    assert!(sync.cancel());

    let outcome = running.await.unwrap().unwrap();
    let SyncOutcome::Cancelled(metadata) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(metadata.nb_releases, 1);
    assert!(metadata.last_successful_execution_at.is_none());
    assert!(!sync.cancel());
}

#[tokio::test]
async fn test_cancel_while_followed_list_loads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/following"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "artists": {"items": [{"id": "a1", "name": "One"}], "next": null}
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/shows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::page(vec![], None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/a1/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::page(vec![], None)))
        .expect(0)
        .mount(&server)
        .await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("a1")]).await.unwrap();
    let sync = common::sync_service(&config, &db);

    let running = tokio::spawn({
        let sync = sync.clone();
        async move { sync.full_refresh(SyncScope::All).await }
    });
    wait_until_running(&sync).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(sync.status().is_some_and(|s| s.running));
    assert!(sync.cancel());

    let outcome = running.await.unwrap().unwrap();
    let SyncOutcome::Cancelled(metadata) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(metadata.last_successful_execution_at.is_none());
    assert!(!sync.is_running());
    assert!(sync.status().is_none());
}

#[tokio::test]
async fn test_rate_limited_artist_is_recorded_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/artists/busy/albums"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    db.replace_artists(vec![common::artist("busy")]).await.unwrap();
    let previous_success = Utc::now() - chrono::Duration::days(1);
    db.set_metadata(&SyncMetadata {
        last_execution_at: previous_success,
        last_successful_execution_at: Some(previous_success),
        nb_artists: 1,
        nb_releases: 0,
        nb_shows: 0,
        nb_episodes: 0,
        artist_errors: vec![],
        show_errors: vec![],
    })
    .await
    .unwrap();
    let sync = common::sync_service(&config, &db);

    let SyncOutcome::Completed(metadata) = sync.start_full_sync(SyncScope::All).await.unwrap()
    else {
        panic!("sync did not complete");
    };

    assert_eq!(metadata.artist_errors.len(), 1);
    assert_eq!(metadata.artist_errors[0].entity_id, "busy");
    assert_eq!(metadata.artist_errors[0].status, Some(429));
    assert_eq!(metadata.nb_releases, 0);
    assert_eq!(metadata.last_successful_execution_at, Some(previous_success));
    assert!(metadata.last_execution_at > previous_success);
}

#[tokio::test]
async fn test_full_refresh_updates_lists_then_syncs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": {"items": [{"id": "a1", "name": "One"}], "next": null, "total": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/shows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"show": {"id": "s1", "name": "Pod"}}],
            "next": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_albums(&server, "a1", vec![common::album("r1", 1)]).await;
    Mock::given(method("GET"))
        .and(path("/v1/shows/s1/episodes"))
        .and(query_param("limit", "5"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::page(vec![common::episode("e1", 1)], None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = common::test_config(&server);
    let db = common::connected_db().await;
    let sync = common::sync_service(&config, &db);

    let SyncOutcome::Completed(metadata) = sync.full_refresh(SyncScope::All).await.unwrap() else {
        panic!("full refresh did not complete");
    };
    assert_eq!(
        (
            metadata.nb_artists,
            metadata.nb_releases,
            metadata.nb_shows,
            metadata.nb_episodes
        ),
        (1, 1, 1, 1)
    );
    let episodes = db.items(ItemKind::Episodes).await.unwrap();
    assert_eq!(episodes[0].parent_entity_id, "s1");
    assert_eq!(episodes[0].extra.get("duration_ms"), Some(&json!(3_600_000)));
}

#[tokio::test]
async fn test_sync_expires_stale_items() {
    let server = MockServer::start().await;
    let config = common::test_config(&server);
    let db = common::connected_db().await;

    // Stored long ago, now outside the window.
    let stale = release_tracker::services::ingest::normalize_item(
        common::album("stale", 120),
        "a1",
        0,
    )
    .unwrap();
    db.insert_items(ItemKind::Releases, vec![stale]).await.unwrap();
    let sync = common::sync_service(&config, &db);

    sync.start_full_sync(SyncScope::All).await.unwrap();
    assert_eq!(db.count_items(ItemKind::Releases).await.unwrap(), 0);
}
