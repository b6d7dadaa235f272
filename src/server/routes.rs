//! Route handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use super::AppState;
use crate::error::PipelineError;
use crate::fanout;
use crate::request::RunPayload;

/// Body of the `/run` acceptance response.
#[derive(Debug, Serialize)]
pub struct Accepted {
    status: &'static str,
    message: &'static str,
    jobs_scheduled: usize,
}

/// Liveness check; needs no token.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "message": "Image generation service is running"
    }))
}

/// Expand the payload into jobs and queue them without waiting.
///
/// The batch is queued whole or not at all: an oversized fan-out is a 422,
/// a queue without room for the batch is a 503.
pub async fn run(State(state): State<AppState>, Json(payload): Json<RunPayload>) -> Response {
    let jobs = match fanout::expand(payload.into_requests()) {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!(error = %e, "Rejected fan-out");
            return rejected(StatusCode::UNPROCESSABLE_ENTITY, &e);
        }
    };

    let scheduled = match state.dispatcher.try_submit_all(jobs) {
        Ok(scheduled) => scheduled,
        Err(e) => {
            error!(error = %e, "Failed to schedule jobs");
            return rejected(StatusCode::SERVICE_UNAVAILABLE, &e);
        }
    };
    info!(jobs = scheduled, "Scheduled background jobs");

    (
        StatusCode::ACCEPTED,
        Json(Accepted {
            status: "accepted",
            message: "Workflow started in background",
            jobs_scheduled: scheduled,
        }),
    )
        .into_response()
}

fn rejected(status: StatusCode, error: &PipelineError) -> Response {
    (status, Json(serde_json::json!({ "detail": error.to_string(), "jobs_scheduled": 0 })))
        .into_response()
}
