//! On-demand aggregation of analytics events with a per-link cache
//!
//! Aggregates are recomputed from the full event set of a link and cached in
//! a moka cache. Every event insert bumps a per-link generation counter and
//! evicts the cached value; an aggregate computed while the generation moved
//! is returned to its caller but not cached.

use dashmap::DashMap;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::analytics::models::AggregatedAnalytics;
use crate::storage::{Storage, StorageResult};

pub struct AnalyticsAggregator {
    storage: Arc<dyn Storage>,
    cache: Cache<String, Arc<AggregatedAnalytics>>,
    /// Invalidation counter per link id
    generations: DashMap<String, u64>,
}

impl AnalyticsAggregator {
    pub fn new_with_config(storage: Arc<dyn Storage>, max_entries: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            storage,
            cache,
            generations: DashMap::new(),
        }
    }

    /// Create an aggregator with default cache settings
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::new_with_config(storage, 10_000, 300)
    }

    fn generation(&self, link_id: &str) -> u64 {
        self.generations.get(link_id).map(|g| *g).unwrap_or(0)
    }

    /// Aggregate all stored events of `link_id`.
    ///
    /// Does not check that the link exists; an unknown id yields empty counts.
    pub async fn aggregate(&self, link_id: &str) -> StorageResult<Arc<AggregatedAnalytics>> {
        if let Some(cached) = self.cache.get(link_id).await {
            debug!(link_id = %link_id, "aggregate cache hit");
            return Ok(cached);
        }

        let generation = self.generation(link_id);
        let events = self.storage.list_events_for_link(link_id).await?;
        let aggregated = Arc::new(AggregatedAnalytics::from_events(&events));

        if self.generation(link_id) == generation {
            self.cache
                .insert(link_id.to_string(), Arc::clone(&aggregated))
                .await;
            // An invalidation may have landed between the check and the insert
            if self.generation(link_id) != generation {
                self.cache.invalidate(link_id).await;
            }
        }

        Ok(aggregated)
    }

    /// Drop any cached aggregate for `link_id`. Called after each event insert.
    pub async fn invalidate(&self, link_id: &str) {
        *self.generations.entry(link_id.to_string()).or_insert(0) += 1;
        self.cache.invalidate(link_id).await;
    }

    /// Forget a removed link entirely
    pub async fn forget(&self, link_id: &str) {
        self.cache.invalidate(link_id).await;
        self.generations.remove(link_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAnalyticsEvent, NewShortLink};
    use crate::storage::MemoryStorage;

    async fn insert_event(storage: &MemoryStorage, link_id: &str, browser: &str) {
        storage
            .insert_event(&NewAnalyticsEvent {
                id: uuid::Uuid::new_v4().to_string(),
                link_id: link_id.to_string(),
                user_agent: String::new(),
                referrer: String::new(),
                browser: browser.to_string(),
                os: "Unknown".to_string(),
                device_type: "desktop".to_string(),
                country: "unknown".to_string(),
                timestamp: 0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_aggregate_is_cached_until_invalidated() {
        let storage = Arc::new(MemoryStorage::new());
        let link = storage
            .insert_link(&NewShortLink::new("https://example.com", "agg", None, None))
            .await
            .unwrap();
        let aggregator = AnalyticsAggregator::new(storage.clone());

        insert_event(&storage, &link.id, "Chrome").await;
        let first = aggregator.aggregate(&link.id).await.unwrap();
        assert_eq!(first.total(), 1);

        // Not invalidated: the cached value is served
        insert_event(&storage, &link.id, "Firefox").await;
        let second = aggregator.aggregate(&link.id).await.unwrap();
        assert_eq!(second, first);

        aggregator.invalidate(&link.id).await;
        let third = aggregator.aggregate(&link.id).await.unwrap();
        assert_eq!(third.total(), 2);
        assert_eq!(third.browser_counts.get("Firefox"), Some(&1));
    }

    #[tokio::test]
    async fn test_aggregate_surfaces_storage_errors() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_unavailable(true);
        let aggregator = AnalyticsAggregator::new(storage);

        assert!(aggregator.aggregate("missing").await.is_err());
    }
}
