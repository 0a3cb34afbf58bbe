// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cursor-following fetcher for paginated catalog listings.

use crate::error::AppError;
use crate::models::FollowedEntity;
use crate::services::resource::Resource;
use crate::services::retry::RetryController;
use serde_json::Value;

/// A page that could not be fetched even after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub status: Option<u16>,
    pub message: String,
}

/// Items collected by `fetch_all`, in fetch order.
#[derive(Debug, Default)]
pub struct Fetched {
    pub items: Vec<Value>,
    /// First page failure; the chain it belonged to stopped there
    pub failure: Option<FetchFailure>,
}

impl Fetched {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Clone)]
pub struct PaginatedFetcher {
    retry: RetryController,
}

impl PaginatedFetcher {
    pub fn new(retry: RetryController) -> Self {
        Self { retry }
    }

    /// Walk every request chain of `resource` for `seed`.
    ///
    /// Each chain follows `next` until it is absent or the resource asks to
    /// stop. A page failure stops only its own chain; items already fetched
    /// are kept. Credential errors abort the whole walk.
    pub async fn fetch_all(
        &self,
        resource: &dyn Resource,
        seed: Option<&FollowedEntity>,
    ) -> Result<Fetched, AppError> {
        let context = seed
            .map(|s| format!("{} ({})", s.name(), s.id()))
            .unwrap_or_else(|| "user".to_string());
        let mut fetched = Fetched::default();

        for first_url in resource.first_urls(seed) {
            let mut next = Some(first_url);

            while let Some(url) = next.take() {
                let body = match self.retry.call(&url, resource.name(), &context).await {
                    Ok(body) => body,
                    Err(AppError::ItemFetch { status, message }) => {
                        if fetched.failure.is_none() {
                            fetched.failure = Some(FetchFailure {
                                url,
                                status,
                                message,
                            });
                        }
                        break;
                    }
                    Err(e) => return Err(e),
                };

                let items = resource.page_items(&body);
                let keep_going = resource.should_continue(items.last());
                tracing::debug!(
                    resource = resource.name(),
                    context = %context,
                    count = items.len(),
                    total = ?resource.total(&body),
                    "Fetched page"
                );
                fetched.items.extend(items);

                if keep_going {
                    next = resource.next_url(&body);
                }
            }
        }

        tracing::info!(
            resource = resource.name(),
            context = %context,
            count = fetched.items.len(),
            complete = fetched.is_complete(),
            "Fetched listing"
        );
        Ok(fetched)
    }
}
