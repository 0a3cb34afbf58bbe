// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-kind contract for paginated catalog listings.
//!
//! A `Resource` tells the fetcher where a listing starts, where the items and
//! the cursor live in a page body, and when to stop following cursors.

use crate::models::FollowedEntity;
use crate::services::catalog::CatalogClient;
use crate::services::ingest::release_timestamp;
use serde_json::Value;

pub trait Resource: Send + Sync {
    /// Label used in logs and failure messages.
    fn name(&self) -> &'static str;

    /// First page URL of every request chain for `seed`.
    fn first_urls(&self, seed: Option<&FollowedEntity>) -> Vec<String>;

    /// The object holding `items`, `next` and `total` in a page body.
    fn page<'a>(&self, body: &'a Value) -> &'a Value {
        body
    }

    fn page_items(&self, body: &Value) -> Vec<Value> {
        self.page(body)
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter(|i| !i.is_null()).cloned().collect())
            .unwrap_or_default()
    }

    /// Absolute URL of the next page, if any.
    fn next_url(&self, body: &Value) -> Option<String> {
        self.page(body)
            .get("next")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn total(&self, body: &Value) -> Option<u64> {
        self.page(body).get("total").and_then(Value::as_u64)
    }

    /// Whether the chain should go on after a page ending with `last_item`.
    fn should_continue(&self, _last_item: Option<&Value>) -> bool {
        true
    }
}

/// Stop once the oldest item of a page predates the recency cutoff.
///
/// Pages are newest first, so later pages can only be older. An item whose
/// date cannot be read does not stop the chain.
fn within_window(last_item: Option<&Value>, cutoff: i64) -> bool {
    match last_item {
        None => false,
        Some(item) => release_timestamp(item).map_or(true, |(_, ts)| ts >= cutoff),
    }
}

/// The user's followed artists.
pub struct FollowedArtists {
    client: CatalogClient,
}

impl FollowedArtists {
    pub fn new(client: CatalogClient) -> Self {
        Self { client }
    }
}

impl Resource for FollowedArtists {
    fn name(&self) -> &'static str {
        "artists"
    }

    fn first_urls(&self, _seed: Option<&FollowedEntity>) -> Vec<String> {
        vec![self.client.followed_artists_url()]
    }

    // Cursor-paged: `{ "artists": { "items", "next", "total", "cursors" } }`
    fn page<'a>(&self, body: &'a Value) -> &'a Value {
        static EMPTY: Value = Value::Null;
        body.get("artists").unwrap_or(&EMPTY)
    }
}

/// The user's saved shows.
pub struct SavedShows {
    client: CatalogClient,
}

impl SavedShows {
    pub fn new(client: CatalogClient) -> Self {
        Self { client }
    }
}

impl Resource for SavedShows {
    fn name(&self) -> &'static str {
        "shows"
    }

    fn first_urls(&self, _seed: Option<&FollowedEntity>) -> Vec<String> {
        vec![self.client.saved_shows_url()]
    }

    /// Saved shows come wrapped as `{ "added_at", "show": {...} }`.
    fn page_items(&self, body: &Value) -> Vec<Value> {
        self.page(body)
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.get("show").cloned())
                    .map(|mut show| {
                        if let Some(obj) = show.as_object_mut() {
                            obj.remove("available_markets");
                        }
                        show
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Albums of one artist, one request chain per release group.
pub struct ArtistReleases {
    client: CatalogClient,
    include_groups: Vec<String>,
    limit: u32,
    cutoff: i64,
}

impl ArtistReleases {
    pub fn new(client: CatalogClient, include_groups: Vec<String>, limit: u32, cutoff: i64) -> Self {
        Self {
            client,
            include_groups,
            limit,
            cutoff,
        }
    }
}

impl Resource for ArtistReleases {
    fn name(&self) -> &'static str {
        "releases"
    }

    fn first_urls(&self, seed: Option<&FollowedEntity>) -> Vec<String> {
        let Some(artist) = seed else {
            return Vec::new();
        };
        self.include_groups
            .iter()
            .map(|group| self.client.artist_albums_url(artist.id(), group, self.limit))
            .collect()
    }

    fn should_continue(&self, last_item: Option<&Value>) -> bool {
        within_window(last_item, self.cutoff)
    }
}

/// Episodes of one show.
pub struct ShowEpisodes {
    client: CatalogClient,
    limit: u32,
    cutoff: i64,
}

impl ShowEpisodes {
    pub fn new(client: CatalogClient, limit: u32, cutoff: i64) -> Self {
        Self {
            client,
            limit,
            cutoff,
        }
    }
}

impl Resource for ShowEpisodes {
    fn name(&self) -> &'static str {
        "episodes"
    }

    fn first_urls(&self, seed: Option<&FollowedEntity>) -> Vec<String> {
        seed.map(|show| vec![self.client.show_episodes_url(show.id(), self.limit)])
            .unwrap_or_default()
    }

    fn should_continue(&self, last_item: Option<&Value>) -> bool {
        within_window(last_item, self.cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Artist;
    use serde_json::json;

    fn client() -> CatalogClient {
        CatalogClient::new(&Config::test_default())
    }

    #[test]
    fn test_artist_page_is_nested() {
        let body = json!({
            "artists": {
                "items": [{"id": "a1", "name": "One"}],
                "next": "http://next",
                "total": 7
            }
        });
        let resource = FollowedArtists::new(client());
        assert_eq!(resource.page_items(&body).len(), 1);
        assert_eq!(resource.next_url(&body).as_deref(), Some("http://next"));
        assert_eq!(resource.total(&body), Some(7));
    }

    #[test]
    fn test_shows_are_unwrapped_without_markets() {
        let body = json!({
            "items": [{"added_at": "x", "show": {"id": "s1", "name": "Pod", "available_markets": ["FR"]}}],
            "next": null
        });
        let items = SavedShows::new(client()).page_items(&body);
        assert_eq!(items, vec![json!({"id": "s1", "name": "Pod"})]);
        assert!(SavedShows::new(client()).next_url(&body).is_none());
    }

    #[test]
    fn test_release_chain_per_group() {
        let artist = FollowedEntity::Artist(Artist {
            id: "a1".to_string(),
            name: "One".to_string(),
            extra: Default::default(),
        });
        let resource = ArtistReleases::new(
            client(),
            vec!["album".to_string(), "single".to_string()],
            5,
            0,
        );
        let urls = resource.first_urls(Some(&artist));
        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with("/artists/a1/albums?include_groups=album&limit=5"));
        assert!(urls[1].contains("include_groups=single"));
    }

    #[test]
    fn test_release_chain_stops_past_cutoff() {
        // 2024-03-01T00:00:00Z
        let cutoff = 1_709_251_200;
        let resource = ArtistReleases::new(client(), vec![], 5, cutoff);

        let recent = json!({"release_date": "2024-03-15", "release_date_precision": "day"});
        let old = json!({"release_date": "2024-02", "release_date_precision": "month"});
        let unreadable = json!({"release_date": "soon", "release_date_precision": "day"});

        assert!(resource.should_continue(Some(&recent)));
        assert!(!resource.should_continue(Some(&old)));
        assert!(resource.should_continue(Some(&unreadable)));
        assert!(!resource.should_continue(None));
    }
}
