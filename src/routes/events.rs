// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-sent sync progress.
//!
//! Each connection is one status subscriber. A client that falls behind its
//! queue bound is disconnected and can simply reconnect.

use crate::services::SyncService;
use crate::AppState;
use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/events", get(status_events))
}

/// Unregisters the subscriber when the client goes away.
struct SubscriberGuard {
    sync: SyncService,
    id: u64,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.sync.unsubscribe(self.id);
    }
}

async fn status_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut subscription = state.sync.subscribe();
    let guard = SubscriberGuard {
        sync: state.sync.clone(),
        id: subscription.id,
    };

    let stream = stream! {
        let _guard = guard;
        while let Some(status) = subscription.receiver.recv().await {
            match serde_json::to_string(&status) {
                Ok(json) => yield Ok::<_, axum::Error>(Event::default().event("status").data(json)),
                Err(e) => tracing::error!(error = %e, "Failed to encode status event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
