//! Read-side HTTP surface: `/health`, `/snapshot` (latest window, when the
//! in-memory snapshot sink is configured) and `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;

use crate::sinks::http::SNAPSHOT_CACHE_CONTROL;
use crate::sinks::memory::MemorySnapshotSink;

#[derive(Clone, Default)]
pub struct AppState {
    pub snapshot: Option<Arc<MemorySnapshotSink>>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/snapshot", get(snapshot))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn snapshot(State(state): State<AppState>) -> Response {
    let Some(mem) = &state.snapshot else {
        return (StatusCode::NOT_FOUND, "snapshot sink is not in-memory").into_response();
    };
    match mem.latest() {
        Some(payload) => (
            [(header::CACHE_CONTROL, SNAPSHOT_CACHE_CONTROL)],
            Json(payload),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(h) => h.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving read api")
}
