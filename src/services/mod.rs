// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync engine and its collaborators.

pub mod catalog;
pub mod credentials;
pub mod ingest;
pub mod pagination;
pub mod resource;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod sync;

pub use catalog::CatalogClient;
pub use credentials::CredentialStore;
pub use ingest::Ingestor;
pub use pagination::{FetchFailure, Fetched, PaginatedFetcher};
pub use retry::{RetryController, RetryPolicy};
pub use status::{StatusBroadcaster, Subscription};
pub use sync::{LogSyncFinished, SyncFinishedHook, SyncOutcome, SyncService};
