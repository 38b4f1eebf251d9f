use axum::{http::StatusCode, routing::get, Router};
use std::sync::Arc;

use crate::config::{AnalyticsConfig, LinkConfig};
use crate::service::LinkService;

use super::handlers::{health_check, redirect_url, RedirectState};

pub fn create_redirect_router(
    service: Arc<LinkService>,
    analytics_config: AnalyticsConfig,
    links: &LinkConfig,
) -> Router {
    let redirect_status = StatusCode::from_u16(links.redirect_status)
        .ok()
        .filter(StatusCode::is_redirection)
        .unwrap_or(StatusCode::FOUND);

    let state = Arc::new(RedirectState {
        service,
        analytics_config,
        redirect_status,
        not_found_redirect: links.not_found_redirect.clone(),
    });

    Router::new()
        .route("/", get(health_check))
        .route("/{code}", get(redirect_url))
        .with_state(state)
}
