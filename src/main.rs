use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spaceurl::config::Config;
use spaceurl::service::LinkService;
use spaceurl::{api, redirect, storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spaceurl=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let storage = storage::connect(&config.database).await?;

    let service = Arc::new(LinkService::from_config(storage, &config)?);
    if config.analytics.enabled {
        info!(
            "📊 Analytics enabled (queue capacity: {})",
            config.analytics.queue_capacity
        );
    } else {
        info!("Analytics disabled, visits will not be recorded");
    }

    // Create routers
    let api_router = api::create_api_router(Arc::clone(&service));
    let redirect_router = redirect::create_redirect_router(
        Arc::clone(&service),
        config.analytics.clone(),
        &config.links,
    );

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - API endpoints available at http://{}/api/...", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);
    info!("   - Short links served as {}/<code>", config.links.public_base_url);

    // Run both servers until ctrl-c
    tokio::try_join!(
        axum::serve(api_listener, api_router).with_graceful_shutdown(shutdown_signal()),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal()),
    )?;

    if let Some(recorder) = service.recorder() {
        recorder.shutdown().await;
        let stats = recorder.stats();
        info!(
            recorded = stats.recorded,
            failed = stats.failed,
            dropped = stats.dropped,
            "Analytics recorder stopped"
        );
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
