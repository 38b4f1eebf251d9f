use crate::models::{AnalyticsEvent, NewAnalyticsEvent, NewShortLink, ShortLink};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Storage wrapper that bounds every call with a deadline
///
/// An expired call surfaces as `StorageError::Timeout` and is handled by
/// callers exactly like any other storage failure.
pub struct TimeoutStorage {
    inner: Arc<dyn Storage>,
    timeout: Duration,
}

impl TimeoutStorage {
    pub fn new(inner: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, call: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "storage call timed out");
                Err(StorageError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl Storage for TimeoutStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn insert_link(&self, link: &NewShortLink) -> StorageResult<ShortLink> {
        self.bounded(self.inner.insert_link(link)).await
    }

    async fn find_link_by_code(&self, short_code: &str) -> StorageResult<Option<ShortLink>> {
        self.bounded(self.inner.find_link_by_code(short_code)).await
    }

    async fn find_link_by_id(&self, id: &str) -> StorageResult<Option<ShortLink>> {
        self.bounded(self.inner.find_link_by_id(id)).await
    }

    async fn delete_link(&self, id: &str) -> StorageResult<bool> {
        self.bounded(self.inner.delete_link(id)).await
    }

    async fn list_links_by_owner(&self, owner_id: &str) -> StorageResult<Vec<ShortLink>> {
        self.bounded(self.inner.list_links_by_owner(owner_id)).await
    }

    async fn insert_event(&self, event: &NewAnalyticsEvent) -> StorageResult<AnalyticsEvent> {
        self.bounded(self.inner.insert_event(event)).await
    }

    async fn list_events_for_link(&self, link_id: &str) -> StorageResult<Vec<AnalyticsEvent>> {
        self.bounded(self.inner.list_events_for_link(link_id)).await
    }

    async fn generate_unique_code(&self) -> StorageResult<String> {
        self.bounded(self.inner.generate_unique_code()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let memory = Arc::new(MemoryStorage::new());
        memory.set_latency(Duration::from_millis(200));
        let storage = TimeoutStorage::new(memory, Duration::from_millis(20));

        let err = storage.find_link_by_code("slow").await.unwrap_err();
        assert!(matches!(err, StorageError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let memory = Arc::new(MemoryStorage::new());
        let storage = TimeoutStorage::new(memory, Duration::from_secs(1));

        let link = storage
            .insert_link(&NewShortLink::new("https://example.com", "fast", None, None))
            .await
            .unwrap();
        let found = storage.find_link_by_code("fast").await.unwrap().unwrap();
        assert_eq!(found.id, link.id);
    }
}
