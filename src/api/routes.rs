use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::service::LinkService;

use super::analytics::get_link_analytics;
use super::handlers::{create_link, delete_link, health_check, list_links, AppState};

pub fn create_api_router(service: Arc<LinkService>) -> Router {
    let state = Arc::new(AppState { service });

    let link_routes = Router::new()
        .route("/links", post(create_link))
        .route("/links", get(list_links))
        .route("/links/{id}", delete(delete_link))
        .route("/links/{id}/analytics", get(get_link_analytics))
        .with_state(state);

    Router::new().nest(
        "/api",
        Router::new()
            .route("/health", get(health_check))
            .merge(link_routes)
            .layer(CorsLayer::permissive()),
    )
}
