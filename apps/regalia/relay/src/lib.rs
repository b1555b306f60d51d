//! Regalia telemetry relay.
//!
//! One producer (the car's logger) and any number of viewers share the same
//! websocket endpoint. Every frame is fanned out to every open connection and
//! the last frame that decodes as a JSON object is kept for late joiners.

pub mod config;
pub mod handlers;
pub mod relay;
pub mod snapshot;
pub mod telemetry;
pub mod websocket;

use std::{future::Future, net::SocketAddr};

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::relay::RelayHandle;

/// Shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(relay: RelayHandle) -> Self {
        Self {
            relay,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard_page))
        .route("/latest", get(handlers::latest_snapshot))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves the relay on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("relay server exited with error")
}
