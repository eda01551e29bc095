//! `POST /api/get-cid`

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use keystone_common::LookupRequest;
use keystone_common::constants::MAX_BODY_BYTES;

use super::{ApiError, json_no_store};
use crate::client_ip;
use crate::state::AppState;

/// Look up a confirmation ID.
///
/// Body: `{"id": "...", "tsToken": "..."}`. The body is read leniently: an
/// unreadable or non-JSON body is handled as `{}` and fails validation like
/// any other request with missing fields.
pub async fn get_cid(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = client_ip::resolve(&parts.headers, peer);

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read request body");
            Bytes::new()
        }
    };
    let lookup = LookupRequest::from_json(&parse_body(&bytes));

    match state.service.handle(lookup, client_ip).await {
        Ok(found) => {
            tracing::debug!(cached = found.cached, "Lookup succeeded");
            json_no_store(StatusCode::OK, found)
        }
        Err(err) => {
            tracing::debug!(status = err.status_code(), error = %err, "Lookup failed");
            ApiError(err).into_response()
        }
    }
}

/// JSON body, or an empty object when it does not parse
fn parse_body(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| serde_json::json!({}))
}
