// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Release-Tracker server
//!
//! Mirrors followed artists and shows, and their recent releases and
//! episodes, from the catalog API. Serves the mirror over HTTP and refreshes
//! it once a day.

use anyhow::Context;
use release_tracker::{
    config::Config,
    db::MirrorDb,
    services::{scheduler, CatalogClient, CredentialStore, LogSyncFinished, SyncService},
    AppState,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Missing client credentials are fatal
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(port = config.port, "Starting Release-Tracker");

    let db = MirrorDb::open(&config.data_dir)
        .await
        .context("Failed to open mirror database")?;

    let catalog = CatalogClient::new(&config);
    let credentials = CredentialStore::new(catalog.clone(), db.clone(), &config.application_url);
    let sync = SyncService::new(
        config.clone(),
        db.clone(),
        catalog,
        credentials,
        Arc::new(LogSyncFinished),
    );

    let shutdown = CancellationToken::new();
    let schedule = scheduler::parse_crontab(&config.sync_cron)
        .with_context(|| format!("Invalid sync schedule '{}'", config.sync_cron))?;
    tokio::spawn(scheduler::run_scheduled(
        sync.clone(),
        schedule,
        shutdown.clone(),
    ));
    tracing::info!(cron = %config.sync_cron, "Sync scheduled (UTC)");

    let state = Arc::new(AppState::new(config.clone(), db, sync));
    let app = release_tracker::routes::create_router(state);

    let addr = format!("{}:{}", config.listen_host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["release_tracker=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry().with(filter).with(format).init();
}
