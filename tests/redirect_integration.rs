//! Redirect integration tests
//!
//! These tests drive the redirect router end to end: status and Location
//! handling, the not-found fallback, and analytics recorded per visit.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use spaceurl::analytics::{Country, CountryResolver, NoGeoIp};
use spaceurl::config::{AnalyticsConfig, LinkConfig, TrustedProxyMode};
use spaceurl::redirect;
use spaceurl::service::LinkService;
use spaceurl::storage::{SqliteStorage, Storage};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower::{Layer, ServiceExt};

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn link_config(redirect_status: u16, not_found_redirect: Option<&str>) -> LinkConfig {
    LinkConfig {
        public_base_url: "https://spc.example".to_string(),
        redirect_status,
        not_found_redirect: not_found_redirect.map(str::to_string),
    }
}

/// Resolves every public address in 198.51.100.0/24 to Norway
struct DocNetCountries;

impl CountryResolver for DocNetCountries {
    fn resolve_country(&self, ip: IpAddr) -> Country {
        match ip {
            IpAddr::V4(v4) if v4.octets()[..3] == [198, 51, 100] => {
                Country::Known("Norway".to_string())
            }
            _ => Country::Unknown,
        }
    }
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Insert test ConnectInfo extension
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));

        self.inner.call(req)
    }
}

fn app(service: Arc<LinkService>, analytics: AnalyticsConfig, links: &LinkConfig) -> Router {
    redirect::create_redirect_router(service, analytics, links).layer(TestConnectInfoLayer)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_redirect_existing_link() {
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(NoGeoIp),
        "https://spc.example",
    ));
    service
        .shorten("https://example.com/destination", Some("redirect_test"), None)
        .await
        .unwrap();

    let app = app(
        Arc::clone(&service),
        AnalyticsConfig::default(),
        &link_config(302, None),
    );

    let response = app.oneshot(get("/redirect_test")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/destination"
    );
}

#[tokio::test]
async fn test_configured_redirect_status() {
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(NoGeoIp),
        "https://spc.example",
    ));
    service
        .shorten("https://example.com", Some("permanent"), None)
        .await
        .unwrap();

    let app = app(service, AnalyticsConfig::default(), &link_config(308, None));
    let response = app.oneshot(get("/permanent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
}

#[tokio::test]
async fn test_redirect_nonexistent_link() {
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(NoGeoIp),
        "https://spc.example",
    ));
    let app = app(service, AnalyticsConfig::default(), &link_config(302, None));

    let response = app.oneshot(get("/nonexistent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::LOCATION).is_none());
}

#[tokio::test]
async fn test_not_found_fallback_redirect() {
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(NoGeoIp),
        "https://spc.example",
    ));
    let app = app(
        service,
        AnalyticsConfig::default(),
        &link_config(302, Some("https://spc.example/not-found")),
    );

    let response = app.oneshot(get("/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://spc.example/not-found"
    );
}

#[tokio::test]
async fn test_removed_link_no_longer_redirects() {
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(NoGeoIp),
        "https://spc.example",
    ));
    let created = service
        .shorten("https://example.com", Some("removed"), Some("alice"))
        .await
        .unwrap();
    let app = app(
        Arc::clone(&service),
        AnalyticsConfig::default(),
        &link_config(302, None),
    );

    let response = app.clone().oneshot(get("/removed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    service.remove(&created.link.id, Some("alice")).await.unwrap();

    let response = app.oneshot(get("/removed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_visit_is_recorded_with_headers() {
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(DocNetCountries),
        "https://spc.example",
    ));
    let created = service
        .shorten("https://example.com", Some("tracked"), None)
        .await
        .unwrap();

    let analytics = AnalyticsConfig {
        trusted_proxy_mode: TrustedProxyMode::Standard,
        ..AnalyticsConfig::default()
    };
    let app = app(Arc::clone(&service), analytics, &link_config(302, None));

    let request = Request::builder()
        .uri("/tracked")
        .header(
            header::USER_AGENT,
            "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
        )
        .header(header::REFERER, "https://news.example/")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    service.recorder().unwrap().flush().await;

    let stats = service.aggregate(&created.link.id).await.unwrap();
    assert_eq!(stats.total(), 1);
    assert_eq!(stats.browser_counts.get("Firefox"), Some(&1));
    assert_eq!(stats.device_counts.get("desktop"), Some(&1));
    assert_eq!(stats.country_counts.get("Norway"), Some(&1));
}

#[tokio::test]
async fn test_concurrent_redirects() {
    // Test that concurrent redirects to the same link all succeed and are all counted
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(NoGeoIp),
        "https://spc.example",
    ));
    let created = service
        .shorten("https://example.com", Some("popular"), None)
        .await
        .unwrap();
    let app = app(
        Arc::clone(&service),
        AnalyticsConfig::default(),
        &link_config(302, None),
    );

    // Spawn many concurrent redirect requests
    let mut handles = vec![];

    for _ in 0..50 {
        let app_clone = app.clone();
        handles.push(tokio::spawn(async move {
            app_clone.oneshot(get("/popular")).await
        }));
    }

    let mut success_count = 0;
    for handle in handles {
        if let Ok(Ok(response)) = handle.await {
            if response.status() == StatusCode::FOUND {
                success_count += 1;
            }
        }
    }
    assert_eq!(success_count, 50, "All 50 redirects should succeed");

    service.recorder().unwrap().flush().await;
    let stats = service.aggregate(&created.link.id).await.unwrap();
    assert_eq!(stats.total(), 50);
}

#[tokio::test]
async fn test_health_check() {
    let service = Arc::new(LinkService::with_recorder(
        create_test_storage().await,
        Arc::new(NoGeoIp),
        "https://spc.example",
    ));
    let app = app(service, AnalyticsConfig::default(), &link_config(302, None));

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
