// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::broadcaster::Broadcaster;
use crate::services::LogReader;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) broadcaster: Arc<Broadcaster>,
    pub(crate) log_reader: Arc<LogReader>,
}

pub fn app(broadcaster: Arc<Broadcaster>, log_reader: Arc<LogReader>) -> Router {
    let state = AppState {
        broadcaster,
        log_reader,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/stats", get(http::stats_handler)) // GET /api/stats
        .route("/api/projects", get(http::projects_handler)) // GET /api/projects
        .route("/api/service/{name}/logs", get(http::service_logs_handler)) // GET /api/service/{name}/logs
        .route("/ws", get(ws::ws_events)) // WS /ws
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
