// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalization, recency filtering and deduplicated insertion of fetched items.
//!
//! `Ingestor::ingest` is the only path that writes releases or episodes.

use crate::db::MirrorDb;
use crate::error::AppError;
use crate::models::{DatePrecision, FollowedEntity, ItemKind, ReleaseItem};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

/// Provider fields that are never stored.
const DROPPED_FIELDS: &[&str] = &["available_markets"];

/// Parse the release date of a raw catalog item.
///
/// Returns the precision and the UTC timestamp of midnight on the first day
/// the date denotes.
pub fn release_timestamp(item: &Value) -> Option<(DatePrecision, i64)> {
    item.as_object().and_then(parse_release_date)
}

fn parse_release_date(fields: &Map<String, Value>) -> Option<(DatePrecision, i64)> {
    let precision: DatePrecision = fields.get("release_date_precision")?.as_str()?.parse().ok()?;
    let date = precision.parse_date(fields.get("release_date")?.as_str()?)?;
    let ts = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
    Some((precision, ts))
}

/// Turn a raw catalog item into a stored item.
pub fn normalize_item(raw: Value, parent_id: &str, added_at: i64) -> Result<ReleaseItem, String> {
    let Value::Object(mut fields) = raw else {
        return Err("item is not an object".to_string());
    };

    let (precision, release_ts) = parse_release_date(&fields).ok_or_else(|| {
        format!(
            "unreadable release date {:?} ({:?})",
            fields.get("release_date"),
            fields.get("release_date_precision")
        )
    })?;

    let id = match fields.remove("id") {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => return Err("item has no id".to_string()),
    };
    let name = match fields.remove("name") {
        Some(Value::String(name)) => name,
        _ => String::new(),
    };
    let release_date = match fields.remove("release_date") {
        Some(Value::String(date)) => date,
        _ => String::new(),
    };

    for key in DROPPED_FIELDS.iter().chain(&[
        "release_date_precision",
        "parent_entity_id",
        "release_date_timestamp",
        "added_date_timestamp",
    ]) {
        fields.remove(*key);
    }

    Ok(ReleaseItem {
        id,
        parent_entity_id: parent_id.to_string(),
        name,
        release_date,
        release_date_precision: precision,
        release_date_timestamp: release_ts,
        added_date_timestamp: added_at,
        extra: fields,
    })
}

#[derive(Clone)]
pub struct Ingestor {
    db: MirrorDb,
    recency_window_days: i64,
}

impl Ingestor {
    pub fn new(db: MirrorDb, recency_window_days: i64) -> Self {
        Self {
            db,
            recency_window_days,
        }
    }

    /// Oldest release timestamp still inside the recency window.
    pub fn cutoff(&self, now: DateTime<Utc>) -> i64 {
        (now - Duration::days(self.recency_window_days)).timestamp()
    }

    /// Store the new, recent items among `raw_items`. Returns how many were inserted.
    pub async fn ingest(
        &self,
        raw_items: Vec<Value>,
        parent: &FollowedEntity,
        kind: ItemKind,
        now: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let cutoff = self.cutoff(now);
        let added_at = now.timestamp();
        let mut seen = self.db.item_ids(kind).await?;
        let mut staged = Vec::new();

        for raw in raw_items {
            let item = match normalize_item(raw, parent.id(), added_at) {
                Ok(item) => item,
                Err(reason) => {
                    tracing::warn!(
                        kind = %kind,
                        parent_id = parent.id(),
                        reason = %reason,
                        "Skipping unreadable item"
                    );
                    continue;
                }
            };

            if item.release_date_timestamp < cutoff {
                continue;
            }
            if !seen.insert(item.id.clone()) {
                continue;
            }

            tracing::info!(
                kind = %kind,
                parent = parent.name(),
                parent_id = parent.id(),
                id = %item.id,
                name = %item.name,
                release_date = %item.release_date,
                "New item"
            );
            staged.push(item);
        }

        let inserted = self.db.insert_items(kind, staged).await?;
        if inserted > 0 {
            tracing::info!(kind = %kind, parent_id = parent.id(), inserted, "Stored new items");
        }
        Ok(inserted)
    }

    /// Delete releases and episodes that left the recency window.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<(usize, usize), AppError> {
        let cutoff = self.cutoff(now);
        let releases = self
            .db
            .remove_items_older_than(ItemKind::Releases, cutoff)
            .await?;
        let episodes = self
            .db
            .remove_items_older_than(ItemKind::Episodes, cutoff)
            .await?;

        tracing::info!(releases, episodes, "Removed outdated entries");
        Ok((releases, episodes))
    }
}
