//! trmnl-relay server entry point.
//!
//! Restores configured instances, then serves the REST and WebSocket
//! endpoints until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trmnl_relay::api;
use trmnl_relay::app_state::AppState;
use trmnl_relay::config::{RelayConfig, load_instances_file};
use trmnl_relay::domain::EventBus;
use trmnl_relay::pipeline::{DeliveryClient, ReqwestTransport, WebhookTransport};
use trmnl_relay::service::{CoordinatorRegistry, PipelineContext, RelayService};
use trmnl_relay::source::{HistorySource, HomeAssistantClient, StateSource};
use trmnl_relay::ws::handler::ws_handler;

/// Upper bound for one HTTP request. Must cover instance creation: a
/// connectivity test plus a full refresh with retries.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(
        addr = %config.listen_addr,
        ha = %config.ha_base_url,
        trmnl = %config.trmnl_base_url,
        timezone = %config.display_timezone,
        "starting trmnl-relay"
    );

    // Collaborators
    let home_assistant = Arc::new(
        HomeAssistantClient::new(&config.ha_base_url, &config.ha_token)
            .context("building Home Assistant client")?,
    );
    let transport = Arc::new(ReqwestTransport::new().context("building webhook transport")?);
    let context = PipelineContext {
        states: Arc::clone(&home_assistant) as Arc<dyn StateSource>,
        history: home_assistant as Arc<dyn HistorySource>,
        delivery: DeliveryClient::new(transport as Arc<dyn WebhookTransport>),
        webhook_base_url: config.trmnl_base_url.clone(),
        timezone: config.display_timezone,
    };

    // Service layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let relay_service = Arc::new(RelayService::new(
        Arc::new(CoordinatorRegistry::new()),
        event_bus,
        context,
    ));

    if let Some(path) = &config.instances_file {
        let instances = load_instances_file(path)?;
        relay_service.restore_all(instances).await;
    }

    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(CorsLayer::permissive()),
        )
        .with_state(AppState::new(Arc::clone(&relay_service)));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    relay_service.shutdown_all().await;
    tracing::info!("trmnl-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
