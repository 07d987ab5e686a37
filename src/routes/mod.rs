// HTTP routes: the collector pulls snapshots from here

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::agent::Agent;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) agent: Arc<Agent>,
    pub(crate) key: Arc<Vec<u8>>,
}

pub fn app(agent: Arc<Agent>, key: Vec<u8>) -> Router {
    let state = AppState {
        agent,
        key: Arc::new(key),
    };
    Router::new()
        .route("/", get(|| async { "hostagent: monitoring agent" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/stats", get(http::stats_handler)) // GET /api/stats
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
