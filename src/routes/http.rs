// GET handlers: version, api/stats

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::AppState;
use crate::version::{NAME, VERSION};

/// GET /version — service name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/stats — one freshly gathered snapshot. Requires `Authorization: Bearer <key>`.
pub(super) async fn stats_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.key) {
        debug!("rejected stats request with missing or wrong key");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    axum::Json(state.agent.gather_stats().await).into_response()
}

fn authorized(headers: &HeaderMap, key: &[u8]) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.as_bytes().strip_prefix(b"Bearer "))
        .is_some_and(|token| constant_time_eq(token, key))
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
