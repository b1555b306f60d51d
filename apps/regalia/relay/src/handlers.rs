use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse, Json},
};
use regalia_core::{FieldCatalog, TelemetryObject};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

const DASHBOARD_PAGE: &str = include_str!("../assets/dashboard.html");
const CATALOG_SLOT: &str = "/*FIELD_CATALOG*/[]";

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    status: &'static str,
    connections: usize,
    has_snapshot: bool,
}

/// GET /latest - the last decoded telemetry object, `{}` before the first one.
pub async fn latest_snapshot(State(state): State<AppState>) -> Json<TelemetryObject> {
    Json(state.relay.snapshot().get())
}

/// GET / - self-contained browser dashboard fed by `/latest` and `/ws`.
pub async fn dashboard_page() -> Html<String> {
    Html(render_dashboard_page(&FieldCatalog::builtin()))
}

/// Inlines the field catalog so the page labels cards like the terminal
/// dashboard does.
pub fn render_dashboard_page(catalog: &FieldCatalog) -> String {
    match serde_json::to_string(catalog.fields()) {
        Ok(fields) => DASHBOARD_PAGE.replacen(CATALOG_SLOT, &fields, 1),
        Err(err) => {
            warn!(error = %err, "serving dashboard without field catalog");
            DASHBOARD_PAGE.to_string()
        }
    }
}

/// GET /health - liveness plus a couple of relay gauges.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        connections: state.relay.connection_count(),
        has_snapshot: state.relay.snapshot().is_populated(),
    })
}

/// GET /metrics - Prometheus exposition.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn page_carries_the_field_catalog() {
        let page = render_dashboard_page(&FieldCatalog::builtin());
        assert!(!page.contains(CATALOG_SLOT));
        assert!(page.contains(r#"{"group":"Current lap","key":"kmph","label":"Speed","unit":"km/h"}"#));
        assert!(page.contains(r#""key":"pibt""#));
    }
}
