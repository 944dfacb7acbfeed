use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use duet_shared::{HealthCheck, HealthResponse};
use std::sync::Arc;

use crate::AppState;

/// Reports on the document store and the event channel.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let store = match state.store.ping().await {
        Ok(()) => HealthCheck::healthy("store"),
        Err(e) => HealthCheck::unhealthy("store", e.to_string()),
    };

    let events = match (&state.rabbitmq, state.config.publish_events) {
        (None, true) => HealthCheck::degraded("events", "publisher not connected"),
        _ => HealthCheck::healthy("events"),
    };

    let response = HealthResponse::new(
        "duet-matching",
        env!("CARGO_PKG_VERSION"),
        vec![store, events],
    );

    (response.status.http_status(), Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
