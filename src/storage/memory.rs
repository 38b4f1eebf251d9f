//! In-process storage backed by `DashMap`
//!
//! Used for tests and single-node deployments without a database. Supports
//! fault injection so callers can exercise unavailable-storage paths.

use crate::models::{AnalyticsEvent, NewAnalyticsEvent, NewShortLink, ShortLink};
use crate::shortcode::random_code;
use crate::storage::{Storage, StorageError, StorageResult, UNIQUE_CODE_ATTEMPTS};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryStorage {
    /// Links keyed by id
    links: DashMap<String, ShortLink>,
    /// short code -> link id
    codes: DashMap<String, String>,
    /// Events keyed by link id. An entry exists for every live link.
    events: DashMap<String, Vec<AnalyticsEvent>>,
    unavailable: AtomicBool,
    unique_code_failure: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only `generate_unique_code` fail.
    pub fn set_unique_code_failure(&self, fail: bool) {
        self.unique_code_failure.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    async fn round_trip(&self) -> StorageResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Other(anyhow!("memory storage marked unavailable")));
        }
        Ok(())
    }

    fn with_click_count(&self, mut link: ShortLink) -> ShortLink {
        link.click_count = self
            .events
            .get(&link.id)
            .map(|events| events.len() as i64)
            .unwrap_or(0);
        link
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_link(&self, link: &NewShortLink) -> StorageResult<ShortLink> {
        self.round_trip().await?;

        match self.codes.entry(link.short_code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict),
            Entry::Vacant(vacant) => {
                let stored = link.clone().into_link();
                self.events.insert(stored.id.clone(), Vec::new());
                self.links.insert(stored.id.clone(), stored.clone());
                vacant.insert(stored.id.clone());
                Ok(stored)
            }
        }
    }

    async fn find_link_by_code(&self, short_code: &str) -> StorageResult<Option<ShortLink>> {
        self.round_trip().await?;

        let Some(id) = self.codes.get(short_code).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        let link = self.links.get(&id).map(|entry| entry.value().clone());
        Ok(link.map(|link| self.with_click_count(link)))
    }

    async fn find_link_by_id(&self, id: &str) -> StorageResult<Option<ShortLink>> {
        self.round_trip().await?;

        let link = self.links.get(id).map(|entry| entry.value().clone());
        Ok(link.map(|link| self.with_click_count(link)))
    }

    async fn delete_link(&self, id: &str) -> StorageResult<bool> {
        self.round_trip().await?;

        let Some((_, link)) = self.links.remove(id) else {
            return Ok(false);
        };
        self.codes.remove(&link.short_code);
        self.events.remove(id);
        Ok(true)
    }

    async fn list_links_by_owner(&self, owner_id: &str) -> StorageResult<Vec<ShortLink>> {
        self.round_trip().await?;

        let mut links: Vec<ShortLink> = self
            .links
            .iter()
            .filter(|entry| entry.value().owner_id.as_deref() == Some(owner_id))
            .map(|entry| entry.value().clone())
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(links
            .into_iter()
            .map(|link| self.with_click_count(link))
            .collect())
    }

    async fn insert_event(&self, event: &NewAnalyticsEvent) -> StorageResult<AnalyticsEvent> {
        self.round_trip().await?;

        let mut events = self
            .events
            .get_mut(&event.link_id)
            .ok_or(StorageError::LinkNotFound)?;
        let stored = event.clone().into_event();
        events.push(stored.clone());
        Ok(stored)
    }

    async fn list_events_for_link(&self, link_id: &str) -> StorageResult<Vec<AnalyticsEvent>> {
        self.round_trip().await?;

        let mut events = self
            .events
            .get(link_id)
            .map(|events| events.value().clone())
            .unwrap_or_default();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn generate_unique_code(&self) -> StorageResult<String> {
        self.round_trip().await?;
        if self.unique_code_failure.load(Ordering::SeqCst) {
            return Err(StorageError::Other(anyhow!("unique code generation disabled")));
        }

        for _ in 0..UNIQUE_CODE_ATTEMPTS {
            let code = random_code();
            if !self.codes.contains_key(&code) {
                return Ok(code);
            }
        }

        Err(StorageError::Other(anyhow!(
            "no free short code after {} attempts",
            UNIQUE_CODE_ATTEMPTS
        )))
    }
}
