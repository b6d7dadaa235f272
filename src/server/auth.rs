//! Bearer token check for the dispatch route.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use super::AppState;

/// Reject requests whose bearer token does not match the configured one.
///
/// No configured token is a server fault (500), not an open door.
pub async fn require_auth(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let Some(ref expected) = state.auth_token else {
        error!("API_AUTH_TOKEN is not configured; rejecting request");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": "Server authentication is not configured" })),
        )
            .into_response();
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => next.run(req).await,
        _ => {
            warn!("Rejected request with missing or invalid bearer token");
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(serde_json::json!({ "detail": "Invalid or missing authentication token" })),
            )
                .into_response()
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
