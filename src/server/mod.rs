//! HTTP dispatch endpoint.

mod auth;
mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tracing::info;

use crate::dispatch::{spawn_workers, Dispatcher};
use crate::error::PipelineError;
use crate::pipeline::Pipeline;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Queue that accepted jobs are pushed onto.
    pub dispatcher: Dispatcher,
    /// Expected bearer token; `None` rejects every `/run` call.
    pub auth_token: Option<String>,
}

/// Server bind and concurrency settings.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Jobs run at once.
    pub workers: usize,
    /// Jobs buffered before `/run` answers 503.
    pub queue_capacity: usize,
    /// Expected bearer token.
    pub auth_token: Option<String>,
}

/// Build the router: `/` is public, `/run` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/run", post(routes::run))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new().route("/", get(routes::health)).merge(protected).with_state(state)
}

/// Serve until ctrl-c.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn serve(pipeline: Arc<Pipeline>, options: ServeOptions) -> Result<(), PipelineError> {
    let (dispatcher, rx) = Dispatcher::new(options.queue_capacity);
    let supervisor = spawn_workers(rx, pipeline, options.workers);
    let app = router(AppState { dispatcher, auth_token: options.auth_token });

    let addr = format!("{}:{}", options.host, options.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, workers = options.workers, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    supervisor.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    use super::*;
    use crate::request::JobRequest;

    fn app(token: Option<&str>) -> (Router, mpsc::Receiver<JobRequest>) {
        app_with_capacity(token, 64)
    }

    fn app_with_capacity(
        token: Option<&str>,
        capacity: usize,
    ) -> (Router, mpsc::Receiver<JobRequest>) {
        let (dispatcher, rx) = Dispatcher::new(capacity);
        let state = AppState { dispatcher, auth_token: token.map(str::to_string) };
        (router(state), rx)
    }

    fn post_run(body: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/run")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _rx) = app(None);
        let response =
            app.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "online");
    }

    #[tokio::test]
    async fn missing_server_token_is_500() {
        let (app, _rx) = app(None);
        let response = app.oneshot(post_run("{}", Some("anything"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn missing_bearer_is_401_with_challenge() {
        let (app, mut rx) = app(Some("secret"));
        let response = app.oneshot(post_run("{}", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn wrong_bearer_is_401() {
        let (app, _rx) = app(Some("secret"));
        let response = app.oneshot(post_run("{}", Some("guess"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn single_request_is_accepted() {
        let (app, mut rx) = app(Some("secret"));
        let response =
            app.oneshot(post_run(r#"{"category": "MD"}"#, Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["message"], "Workflow started in background");
        assert_eq!(body["jobs_scheduled"], 1);
        assert_eq!(rx.recv().await.unwrap().category.as_deref(), Some("MD"));
    }

    #[tokio::test]
    async fn batch_counts_expanded_jobs() {
        let (app, mut rx) = app(Some("secret"));
        let body = r#"[
            {"category": "MD", "duplicate": true, "min_val": 4, "max_val": 3},
            {"category": "Self"}
        ]"#;
        let response = app.oneshot(post_run(body, Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["jobs_scheduled"], 4);

        let mut received = Vec::new();
        while let Ok(job) = rx.try_recv() {
            received.push(job);
        }
        assert_eq!(received.len(), 4);
        assert!(received[..3].iter().all(|j| j.min_count == Some(4) && j.max_count == Some(4)));
        assert_eq!(received[3].category.as_deref(), Some("Self"));
    }

    #[tokio::test]
    async fn malformed_payload_is_client_error() {
        let (app, _rx) = app(Some("secret"));
        let response =
            app.oneshot(post_run(r#"{"mode": "sideways"}"#, Some("secret"))).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn batch_beyond_queue_room_is_refused_immediately() {
        let (app, mut rx) = app_with_capacity(Some("secret"), 64);
        let body = r#"{"duplicate": true, "min_val": 1, "max_val": 100}"#;

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            app.oneshot(post_run(body, Some("secret"))),
        )
        .await
        .expect("/run must answer without waiting for queue room")
        .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["jobs_scheduled"], 0);
        assert!(body["detail"].as_str().unwrap().contains("100 jobs requested"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn batch_filling_queue_exactly_is_accepted() {
        let (app, mut rx) = app_with_capacity(Some("secret"), 10);
        let body = r#"{"duplicate": true, "min_val": 1, "max_val": 10}"#;
        let response = app.oneshot(post_run(body, Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["jobs_scheduled"], 10);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 10);
    }

    #[tokio::test]
    async fn oversized_fan_out_is_422() {
        let (app, mut rx) = app(Some("secret"));
        let body = r#"{"duplicate": true, "min_val": 1, "max_val": 1000000000000}"#;
        let response = app.oneshot(post_run(body, Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_body(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("Too many copies requested"));
        assert!(rx.try_recv().is_err());
    }
}
