use crate::models::{AnalyticsEvent, NewAnalyticsEvent, NewShortLink, ShortLink};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error("referenced link does not exist")]
    LinkNotFound,
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent store for short links and their analytics events.
///
/// Every call is a round-trip to an external system and may fail or time out.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a link. Fails with `Conflict` when the short code is taken.
    async fn insert_link(&self, link: &NewShortLink) -> StorageResult<ShortLink>;

    /// Get a link by short code
    async fn find_link_by_code(&self, short_code: &str) -> StorageResult<Option<ShortLink>>;

    /// Get a link by id
    async fn find_link_by_id(&self, id: &str) -> StorageResult<Option<ShortLink>>;

    /// Delete a link and its events. Returns false when no such link existed.
    async fn delete_link(&self, id: &str) -> StorageResult<bool>;

    /// Links created by `owner_id`, newest first
    async fn list_links_by_owner(&self, owner_id: &str) -> StorageResult<Vec<ShortLink>>;

    /// Append an analytics event. Fails with `LinkNotFound` when the link is gone.
    async fn insert_event(&self, event: &NewAnalyticsEvent) -> StorageResult<AnalyticsEvent>;

    /// All events recorded for a link, oldest first
    async fn list_events_for_link(&self, link_id: &str) -> StorageResult<Vec<AnalyticsEvent>>;

    /// Produce a short code that is not used by any stored link at the time of the call.
    async fn generate_unique_code(&self) -> StorageResult<String>;
}
