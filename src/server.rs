//! HTTP transport for the submission router.
//!
//! ## Routes
//!
//! - `POST {path}` - submit a rating or review. Body = JSON object.
//! - `GET {path}` - liveness ping for browser testing.
//! - `GET /health` - returns `{ "ok": true, "version": ... }`.
//!
//! Every response carries permissive CORS headers.

use std::any::Any;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::SubmissionError;
use crate::router::{Outcome, SubmissionRouter};

/// Message returned for faults whose detail is only logged.
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

#[derive(Serialize)]
struct Saved<'a, T: Serialize> {
    message: &'a str,
    saved: T,
}

/// Build an axum `Router` serving submissions at `path`.
pub fn router(submissions: Arc<SubmissionRouter>, path: &str) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    let cors_layer = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(cors::Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(&path, get(liveness_handler).post(submit_handler))
        .with_state(submissions)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
}

/// Serve the router at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve(app: Router, addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true, "version": env!("CARGO_PKG_VERSION") }))
}

async fn liveness_handler() -> impl IntoResponse {
    Json(json!({ "ok": true, "message": "Ratings endpoint is alive. POST only." }))
}

/// Decode the raw body. An empty body is treated as `{}`.
fn parse_body(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
}

async fn submit_handler(
    State(submissions): State<Arc<SubmissionRouter>>,
    body: Bytes,
) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!("Rejected request body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Invalid JSON body" })),
            )
                .into_response();
        }
    };

    match submissions.dispatch(&body).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => error_response(e),
    }
}

fn outcome_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Warmup => Json(json!({ "message": "Warmup acknowledged" })).into_response(),
        Outcome::Rated(record) => Json(Saved {
            message: "Thanks for rating!",
            saved: record,
        })
        .into_response(),
        Outcome::Reviewed(review) => Json(Saved {
            message: "Thanks for your review!",
            saved: review,
        })
        .into_response(),
    }
}

fn error_response(err: SubmissionError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match &err {
        SubmissionError::Validation(message) => json!({ "message": message }),
        SubmissionError::WriteRejected(errors) => {
            warn!("Store rejected update: {:?}", errors);
            json!({ "message": "Store rejected the update", "errors": errors })
        }
        SubmissionError::RemoteRead(e) => {
            json!({ "message": "Failed to read current state", "error": e.to_string() })
        }
        SubmissionError::RemoteWrite(e) => {
            json!({ "message": "Failed to save update", "error": e.to_string() })
        }
        SubmissionError::WriteUnacknowledged => {
            error!("Store returned no acknowledgment for write");
            json!({ "message": "Store did not acknowledge the write" })
        }
        SubmissionError::Unexpected(detail) => {
            error!("Unexpected failure: {}", detail);
            json!({ "message": SERVER_ERROR_MESSAGE })
        }
    };

    (status, Json(body)).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": SERVER_ERROR_MESSAGE })),
    )
        .into_response()
}
