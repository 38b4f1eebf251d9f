use axum::{
    extract::{ConnectInfo, Path, State},
    http::{
        header::{HeaderMap, HeaderName, LOCATION, REFERER, USER_AGENT},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::{extract_client_ip, Visit};
use crate::config::AnalyticsConfig;
use crate::service::{LinkService, RedirectOutcome};

pub struct RedirectState {
    pub service: Arc<LinkService>,
    pub analytics_config: AnalyticsConfig,
    pub redirect_status: StatusCode,
    pub not_found_redirect: Option<String>,
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// `Location` value for a stored URL; non-ASCII URLs are sent percent-encoded.
fn location_value(url: &str) -> Option<HeaderValue> {
    if url.is_ascii() {
        return HeaderValue::from_str(url).ok();
    }
    match url::Url::parse(url) {
        Ok(parsed) => HeaderValue::from_str(parsed.as_str()).ok(),
        Err(_) => HeaderValue::from_str(url).ok(),
    }
}

fn redirect_to(status: StatusCode, url: &str) -> Response {
    match location_value(url) {
        Some(location) => (status, [(LOCATION, location)]).into_response(),
        None => {
            tracing::error!(url = %url, "destination cannot be sent as a Location header");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Redirect to original URL
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let visit = Visit {
        user_agent: header_string(&headers, USER_AGENT),
        referrer: header_string(&headers, REFERER),
        client_ip: Some(extract_client_ip(
            &headers,
            addr.ip(),
            &state.analytics_config,
        )),
    };

    match state.service.resolve(&code, visit).await {
        RedirectOutcome::Found(url) => redirect_to(state.redirect_status, &url),
        RedirectOutcome::NotFound => match &state.not_found_redirect {
            Some(fallback) => redirect_to(StatusCode::FOUND, fallback),
            None => (StatusCode::NOT_FOUND, "Link not found").into_response(),
        },
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
