// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use release_tracker::config::Config;
use release_tracker::db::MirrorDb;
use release_tracker::models::{Artist, Credential, Show};
use release_tracker::routes::create_router;
use release_tracker::services::{CatalogClient, CredentialStore, LogSyncFinished, SyncService};
use release_tracker::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::MockServer;

/// Config pointing both catalog hosts at `server`.
#[allow(dead_code)]
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::test_default();
    config.catalog_api_url = format!("{}/v1", server.uri());
    config.catalog_accounts_url = server.uri();
    config.include_groups = vec!["album".to_string()];
    config
}

#[allow(dead_code)]
pub fn valid_credential() -> Credential {
    Credential {
        access_token: "valid_access".to_string(),
        refresh_token: "stored_refresh".to_string(),
        expires_on: Utc::now() + Duration::hours(1),
        scope: None,
        token_type: Some("Bearer".to_string()),
    }
}

#[allow(dead_code)]
pub fn expired_credential() -> Credential {
    Credential {
        expires_on: Utc::now() - Duration::minutes(1),
        access_token: "expired_access".to_string(),
        ..valid_credential()
    }
}

/// In-memory mirror with a connected user.
#[allow(dead_code)]
pub async fn connected_db() -> MirrorDb {
    let db = MirrorDb::in_memory();
    db.set_credential(&valid_credential()).await.unwrap();
    db
}

#[allow(dead_code)]
pub fn credential_store(config: &Config, db: &MirrorDb) -> CredentialStore {
    CredentialStore::new(CatalogClient::new(config), db.clone(), &config.application_url)
}

#[allow(dead_code)]
pub fn sync_service(config: &Config, db: &MirrorDb) -> SyncService {
    SyncService::new(
        config.clone(),
        db.clone(),
        CatalogClient::new(config),
        credential_store(config, db),
        Arc::new(LogSyncFinished),
    )
}

/// Create a test app over `db`.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(config: Config, db: MirrorDb) -> (axum::Router, Arc<AppState>) {
    let sync = sync_service(&config, &db);
    let state = Arc::new(AppState::new(config, db, sync));
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn artist(id: &str) -> Artist {
    Artist {
        id: id.to_string(),
        name: format!("Artist {}", id),
        extra: Default::default(),
    }
}

#[allow(dead_code)]
pub fn show(id: &str) -> Show {
    Show {
        id: id.to_string(),
        name: format!("Show {}", id),
        publisher: None,
        extra: Default::default(),
    }
}

/// `YYYY-MM-DD` for `days_ago` days before today (UTC).
#[allow(dead_code)]
pub fn days_ago(days_ago: i64) -> String {
    (Utc::now() - Duration::days(days_ago))
        .format("%Y-%m-%d")
        .to_string()
}

/// Raw catalog album released `days` days ago.
#[allow(dead_code)]
pub fn album(id: &str, days: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Album {}", id),
        "album_type": "album",
        "release_date": days_ago(days),
        "release_date_precision": "day",
        "total_tracks": 9,
        "available_markets": ["FR", "US"]
    })
}

/// Raw catalog episode released `days` days ago.
#[allow(dead_code)]
pub fn episode(id: &str, days: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Episode {}", id),
        "release_date": days_ago(days),
        "release_date_precision": "day",
        "duration_ms": 3_600_000
    })
}

/// One page of a plain listing.
#[allow(dead_code)]
pub fn page(items: Vec<Value>, next: Option<String>) -> Value {
    json!({
        "items": items,
        "next": next,
        "total": 0
    })
}
