//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    cache: bool,
}

/// Readiness check (is the cache backend reachable?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    let Some(cache) = state.service.cache() else {
        return Ok(Json(ReadyResponse {
            status: "ready",
            cache: false,
        }));
    };

    match cache.ping().await {
        Ok(()) => Ok(Json(ReadyResponse {
            status: "ready",
            cache: true,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Cache backend not reachable");
            // Return 503 if not ready
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
