//! HTTP route handlers for Keystone.

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use keystone_common::{ErrorBody, RelayError};

use crate::ratelimit;
use crate::state::AppState;

mod cid;
mod health;

/// Create the main application router
pub fn create_router(state: AppState, static_dir: Option<&str>) -> Router {
    let router = Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Lookup API, rate limited per client IP
        .nest("/api", api_routes(state.clone()))

        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Front-end page and assets
    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/get-cid", post(cid::get_cid))
        .route_layer(middleware::from_fn_with_state(state, ratelimit::enforce))
}

/// JSON response that must not be stored by browsers or proxies
pub fn json_no_store<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// `{"error": message}` with the given status
pub fn json_error(status: StatusCode, message: &str) -> Response {
    json_no_store(
        status,
        ErrorBody {
            error: message.to_string(),
        },
    )
}

/// Route-level error wrapper
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        json_error(status, &self.0.public_message())
    }
}
