//! HTTP transport: a single JSON-RPC endpoint plus a health check,
//! optionally gated by a static bearer/API-key credential.

use crate::dispatch::handle_request;
use crate::state::GatewayState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use pgmcp_protocol::JsonRpcRequest;
use serde_json::Value;
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Builds the router for the HTTP transport: `POST /mcp/v1` carries JSON-RPC
/// traffic, `GET /healthz` is an unauthenticated liveness probe.
pub fn create_router(state: GatewayState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let has_auth = state.has_auth();

    let mcp_routes = Router::new().route("/mcp/v1", post(handle_mcp)).with_state(state.clone());

    let mcp_routes = if has_auth {
        mcp_routes.layer(axum::middleware::from_fn_with_state(state.clone(), api_key_auth))
    } else {
        mcp_routes
    };

    Router::new()
        .merge(mcp_routes)
        .route("/healthz", get(health))
        .layer(cors)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok: healthy")
}

async fn handle_mcp(State(state): State<GatewayState>, headers: HeaderMap, body: String) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(r) => r,
        Err(e) => {
            let response = pgmcp_protocol::JsonRpcResponse::parse_error(e.to_string());
            return Json(response).into_response();
        }
    };

    let identity_hash = extract_api_key(&headers).map(identity_for_key);

    match handle_request(&state, request, identity_hash).await {
        Some(response) => Json(response).into_response(),
        // A notification has no JSON-RPC reply; acknowledge at the transport
        // level so the client doesn't wait on a body that will never arrive.
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Derives the per-identity hash used to scope database connections from a
/// caller's credential, so two callers never share a pooled client.
fn identity_for_key(key: &str) -> String {
    pgmcp_util::fingerprint([key.as_bytes()])
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(key) = auth.strip_prefix("Bearer ") {
            return Some(key.trim());
        }
    }
    None
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

async fn api_key_auth(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let Some(ref expected_key) = state.api_key else {
        return Ok(next.run(request).await);
    };

    match extract_api_key(request.headers()) {
        Some(key) if constant_time_eq(key.as_bytes(), expected_key.as_bytes()) => Ok(next.run(request).await),
        Some(_) => {
            warn!("invalid API key provided for MCP endpoint");
            Err((StatusCode::UNAUTHORIZED, Json(serde_json::json!({"error": "invalid API key"}))))
        }
        None => {
            warn!("missing API key for MCP endpoint");
            Err((StatusCode::UNAUTHORIZED, Json(serde_json::json!({"error": "authentication required"}))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"wrong"));
    }

    #[test]
    fn test_identity_for_key_is_deterministic() {
        assert_eq!(identity_for_key("abc"), identity_for_key("abc"));
        assert_ne!(identity_for_key("abc"), identity_for_key("def"));
    }
}
