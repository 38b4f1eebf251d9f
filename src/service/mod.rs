//! Link service: the API the web front end and admin CLI call into
//!
//! Owner identity is always passed in explicitly; the service keeps no
//! session state of its own.

mod errors;
pub mod validate;

pub use errors::{ServiceError, ServiceResult, ValidationError};

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::analytics::{
    AggregatedAnalytics, AnalyticsAggregator, AnalyticsRecorder, CountryResolver, EventWriter,
    GeoIpService, NoGeoIp, Visit,
};
use crate::config::Config;
use crate::models::{NewShortLink, ShortLink};
use crate::shortcode::CodeGenerator;
use crate::storage::{Storage, StorageError};

use validate::{normalize_alias, validate_alias, validate_original_url};

/// What the redirect front end should do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Found(String),
    NotFound,
}

/// Lookup result that keeps storage failures apart from plain misses
#[derive(Debug)]
pub enum Resolution {
    Found(ShortLink),
    Missing,
    StorageFailed(StorageError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortenedLink {
    pub short_code: String,
    pub short_url: String,
    pub link: ShortLink,
}

pub struct LinkService {
    storage: Arc<dyn Storage>,
    generator: CodeGenerator,
    aggregator: Arc<AnalyticsAggregator>,
    recorder: Option<AnalyticsRecorder>,
    public_base_url: String,
}

impl LinkService {
    pub fn new(
        storage: Arc<dyn Storage>,
        aggregator: Arc<AnalyticsAggregator>,
        recorder: Option<AnalyticsRecorder>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            generator: CodeGenerator::new(Arc::clone(&storage)),
            storage,
            aggregator,
            recorder,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Wire a service with a recorder that resolves countries through `countries`.
    ///
    /// Must be called inside a tokio runtime: the recorder actor is spawned here.
    pub fn with_recorder(
        storage: Arc<dyn Storage>,
        countries: Arc<dyn CountryResolver>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let aggregator = Arc::new(AnalyticsAggregator::new(Arc::clone(&storage)));
        let writer = EventWriter::new(Arc::clone(&storage), countries, Arc::clone(&aggregator));
        let recorder = AnalyticsRecorder::spawn(writer, 10_000);
        Self::new(storage, aggregator, Some(recorder), public_base_url)
    }

    /// Build the service from configuration. Opens the GeoIP database when configured.
    pub fn from_config(storage: Arc<dyn Storage>, config: &Config) -> anyhow::Result<Self> {
        let analytics = &config.analytics;
        let aggregator = Arc::new(AnalyticsAggregator::new_with_config(
            Arc::clone(&storage),
            analytics.cache_capacity,
            analytics.cache_ttl_secs,
        ));

        let recorder = if analytics.enabled {
            let countries: Arc<dyn CountryResolver> = match analytics.geoip_db_path.as_deref() {
                Some(path) => {
                    info!("Loading GeoIP database from {}", path);
                    Arc::new(GeoIpService::new(path)?)
                }
                None => {
                    info!("No GeoIP database configured, countries will be recorded as unknown");
                    Arc::new(NoGeoIp)
                }
            };
            let writer =
                EventWriter::new(Arc::clone(&storage), countries, Arc::clone(&aggregator));
            Some(AnalyticsRecorder::spawn(writer, analytics.queue_capacity))
        } else {
            None
        };

        Ok(Self::new(
            storage,
            aggregator,
            recorder,
            config.links.public_base_url.clone(),
        ))
    }

    pub fn recorder(&self) -> Option<&AnalyticsRecorder> {
        self.recorder.as_ref()
    }

    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.public_base_url, short_code)
    }

    /// Create a short link.
    ///
    /// A taken alias or generated code fails with `CodeTaken`; generation is
    /// not retried here.
    pub async fn shorten(
        &self,
        original_url: &str,
        alias: Option<&str>,
        owner_id: Option<&str>,
    ) -> ServiceResult<ShortenedLink> {
        let original_url = validate_original_url(original_url)?;

        let (short_code, custom_alias) = match normalize_alias(alias) {
            Some(alias) => {
                validate_alias(alias)?;
                (alias.to_string(), Some(alias.to_string()))
            }
            None => (self.generator.generate().await, None),
        };

        let new_link = NewShortLink::new(
            original_url,
            short_code.clone(),
            custom_alias,
            owner_id.map(str::to_string),
        );

        let link = match self.storage.insert_link(&new_link).await {
            Ok(link) => link,
            Err(StorageError::Conflict) => {
                return Err(ValidationError::CodeTaken(short_code).into());
            }
            Err(err) => return Err(ServiceError::StorageUnavailable(err)),
        };

        info!(short_code = %link.short_code, link_id = %link.id, "created short link");
        Ok(ShortenedLink {
            short_url: self.short_url(&link.short_code),
            short_code: link.short_code.clone(),
            link,
        })
    }

    /// Look up a code, keeping storage failures distinct from misses.
    pub async fn lookup(&self, code: &str) -> Resolution {
        if code.is_empty() {
            return Resolution::Missing;
        }

        match self.storage.find_link_by_code(code).await {
            Ok(Some(link)) => Resolution::Found(link),
            Ok(None) => Resolution::Missing,
            Err(err) => Resolution::StorageFailed(err),
        }
    }

    /// Resolve a code for a visitor and queue the visit for analytics.
    ///
    /// Storage failures are logged and reported as `NotFound`.
    pub async fn resolve(&self, code: &str, visit: Visit) -> RedirectOutcome {
        match self.lookup(code).await {
            Resolution::Found(link) => {
                if let Some(recorder) = &self.recorder {
                    recorder.record(&link.id, visit);
                }
                RedirectOutcome::Found(link.original_url)
            }
            Resolution::Missing => {
                debug!(short_code = %code, "short code not found");
                RedirectOutcome::NotFound
            }
            Resolution::StorageFailed(err) => {
                error!(short_code = %code, error = %err, "storage failure while resolving short code");
                RedirectOutcome::NotFound
            }
        }
    }

    /// Links owned by `owner_id`, newest first.
    pub async fn list_for_owner(&self, owner_id: &str) -> ServiceResult<Vec<ShortLink>> {
        self.storage
            .list_links_by_owner(owner_id)
            .await
            .map_err(ServiceError::StorageUnavailable)
    }

    /// Aggregate analytics for a link.
    pub async fn aggregate(&self, link_id: &str) -> ServiceResult<AggregatedAnalytics> {
        if self.storage.find_link_by_id(link_id).await?.is_none() {
            return Err(ServiceError::NotFound);
        }

        let aggregated = self.aggregator.aggregate(link_id).await?;
        Ok(aggregated.as_ref().clone())
    }

    /// Delete a link on behalf of `requesting_owner_id`.
    ///
    /// Anonymous links have no owner and cannot be removed through this call.
    pub async fn remove(&self, link_id: &str, requesting_owner_id: Option<&str>) -> ServiceResult<()> {
        let link = self
            .storage
            .find_link_by_id(link_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if !link.is_owned_by(requesting_owner_id) {
            return Err(ServiceError::NotOwner);
        }

        if !self.storage.delete_link(link_id).await? {
            // Deleted concurrently
            return Err(ServiceError::NotFound);
        }
        self.aggregator.forget(link_id).await;

        info!(short_code = %link.short_code, link_id = %link.id, "removed short link");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalyticsEvent, NewAnalyticsEvent};
    use crate::storage::{MemoryStorage, StorageResult};
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    fn service(storage: Arc<MemoryStorage>) -> LinkService {
        LinkService::with_recorder(storage, Arc::new(NoGeoIp), "https://spc.example/")
    }

    #[tokio::test]
    async fn test_short_url_uses_base() {
        let service = service(Arc::new(MemoryStorage::new()));
        assert_eq!(service.short_url("abc"), "https://spc.example/abc");
    }

    #[tokio::test]
    async fn test_lookup_distinguishes_storage_failure() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(storage.clone());

        assert!(matches!(service.lookup("nope").await, Resolution::Missing));

        storage.set_unavailable(true);
        assert!(matches!(
            service.lookup("nope").await,
            Resolution::StorageFailed(_)
        ));
        assert_eq!(
            service.resolve("nope", Visit::default()).await,
            RedirectOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_empty_code_is_not_found() {
        let service = service(Arc::new(MemoryStorage::new()));
        assert_eq!(
            service.resolve("", Visit::default()).await,
            RedirectOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_blank_alias_generates_code() {
        let service = service(Arc::new(MemoryStorage::new()));
        let created = service
            .shorten("https://example.com", Some("  "), None)
            .await
            .unwrap();

        assert_eq!(created.short_code.len(), crate::shortcode::CODE_LENGTH);
        assert_eq!(created.link.custom_alias, None);
    }

    #[tokio::test]
    async fn test_shorten_storage_down_is_unavailable() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(storage.clone());
        storage.set_unavailable(true);

        let err = service
            .shorten("https://example.com", Some("abc"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StorageUnavailable(_)));
    }

    /// Memory storage whose event inserts are slow
    struct SlowEvents {
        inner: MemoryStorage,
        delay: Duration,
    }

    #[async_trait]
    impl Storage for SlowEvents {
        async fn init(&self) -> anyhow::Result<()> {
            self.inner.init().await
        }

        async fn insert_link(&self, link: &NewShortLink) -> StorageResult<ShortLink> {
            self.inner.insert_link(link).await
        }

        async fn find_link_by_code(&self, short_code: &str) -> StorageResult<Option<ShortLink>> {
            self.inner.find_link_by_code(short_code).await
        }

        async fn find_link_by_id(&self, id: &str) -> StorageResult<Option<ShortLink>> {
            self.inner.find_link_by_id(id).await
        }

        async fn delete_link(&self, id: &str) -> StorageResult<bool> {
            self.inner.delete_link(id).await
        }

        async fn list_links_by_owner(&self, owner_id: &str) -> StorageResult<Vec<ShortLink>> {
            self.inner.list_links_by_owner(owner_id).await
        }

        async fn insert_event(&self, event: &NewAnalyticsEvent) -> StorageResult<AnalyticsEvent> {
            tokio::time::sleep(self.delay).await;
            self.inner.insert_event(event).await
        }

        async fn list_events_for_link(&self, link_id: &str) -> StorageResult<Vec<AnalyticsEvent>> {
            self.inner.list_events_for_link(link_id).await
        }

        async fn generate_unique_code(&self) -> StorageResult<String> {
            self.inner.generate_unique_code().await
        }
    }

    #[tokio::test]
    async fn test_resolve_does_not_wait_for_slow_recording() {
        let storage: Arc<dyn Storage> = Arc::new(SlowEvents {
            inner: MemoryStorage::new(),
            delay: Duration::from_millis(300),
        });
        let aggregator = Arc::new(AnalyticsAggregator::new(Arc::clone(&storage)));
        let writer = EventWriter::new(Arc::clone(&storage), Arc::new(NoGeoIp), Arc::clone(&aggregator));
        let recorder = AnalyticsRecorder::spawn(writer, 1);
        let service = LinkService::new(storage, aggregator, Some(recorder), "https://spc.example");

        service
            .shorten("https://example.com", Some("slow"), None)
            .await
            .unwrap();

        let started = Instant::now();
        for _ in 0..5 {
            assert_eq!(
                service.resolve("slow", Visit::default()).await,
                RedirectOutcome::Found("https://example.com".to_string())
            );
        }
        assert!(
            started.elapsed() < Duration::from_millis(150),
            "resolve waited on event inserts: {:?}",
            started.elapsed()
        );

        let recorder = service.recorder().unwrap();
        assert!(recorder.stats().dropped >= 3);
        recorder.flush().await;
        let stats = recorder.stats();
        assert_eq!(stats.recorded + stats.dropped, 5);
    }

    #[tokio::test]
    async fn test_anonymous_link_cannot_be_removed() {
        let service = service(Arc::new(MemoryStorage::new()));
        let created = service
            .shorten("https://example.com", Some("anon"), None)
            .await
            .unwrap();

        let err = service.remove(&created.link.id, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotOwner));
    }
}
