// GET handlers: version, on-demand snapshots, service logs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::AppState;

/// GET /version: package name and version baked in at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/stats: metrics sampled now.
pub(super) async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.broadcaster.metrics_snapshot().await)
}

/// GET /api/projects: services and files now, full content for every file.
pub(super) async fn projects_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.broadcaster.projects_snapshot().await)
}

#[derive(Debug, Deserialize)]
pub(super) struct LogQuery {
    lines: Option<usize>,
}

/// GET /api/service/{name}/logs?lines=N: recent journal lines for a configured service.
pub(super) async fn service_logs_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    if !state.broadcaster.services().iter().any(|s| *s == name) {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({
                "service": name,
                "error": "service is not monitored",
            })),
        );
    }
    let logs = state.log_reader.recent_logs(&name, query.lines).await;
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({
            "service": name,
            "logs": logs,
        })),
    )
}
