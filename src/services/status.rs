// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort fan-out of sync progress.
//!
//! The latest snapshot lives in a `watch` channel so readers never wait on
//! the sync. Each subscriber gets its own bounded queue; publishing never
//! blocks, and a subscriber whose queue is full or closed is dropped.

use crate::models::SyncStatus;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// A registered status listener.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<SyncStatus>,
}

pub struct StatusBroadcaster {
    current: watch::Sender<Option<SyncStatus>>,
    subscribers: DashMap<u64, mpsc::Sender<SyncStatus>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl StatusBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a listener. A sync already in progress is reported right away.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);

        if let Some(status) = self.current() {
            let _ = tx.try_send(status);
        }
        self.subscribers.insert(id, tx);
        tracing::debug!(subscriber_id = id, "Status subscriber connected");

        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber_id = id, "Status subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Snapshot of the running sync, `None` when idle.
    pub fn current(&self) -> Option<SyncStatus> {
        *self.current.borrow()
    }

    /// Record `status` as current and push it to every subscriber.
    ///
    /// A status with `running == false` clears the current snapshot.
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, status: SyncStatus) -> usize {
        self.current
            .send_replace(if status.running { Some(status) } else { None });

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(status) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = *entry.key(), "Status subscriber lagging, disconnecting");
                    dropped.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => dropped.push(*entry.key()),
            }
        }

        for id in dropped {
            self.unsubscribe(id);
        }
        delivered
    }

    /// Apply `update` to the running snapshot and publish the result.
    /// No-op when idle.
    pub fn update<F>(&self, update: F) -> usize
    where
        F: FnOnce(&mut SyncStatus),
    {
        let Some(mut status) = self.current() else {
            return 0;
        };
        update(&mut status);
        self.publish(status)
    }

    /// Publish the final `running == false` snapshot, if a sync was running.
    pub fn finish(&self) -> usize {
        match self.current() {
            Some(mut status) => {
                status.running = false;
                self.publish(status)
            }
            None => 0,
        }
    }
}
