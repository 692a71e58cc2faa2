//! HTTP surface (axum), enabled by the `server` feature.
//!
//! [`build_router`] is shared by the binary and the integration tests so both
//! run the same middleware stack.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::any::Any;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Build the application [`Router`] with all middleware layers.
///
/// Layers, outermost first: CORS (any origin), request id, tracing, request
/// id propagation, timeout body, timeout, panic recovery, body limit.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .nest("/api", routes::router())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(middleware::map_response(timeout_response))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A panicking handler answers 500 with the usual `{"detail"}` body.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let reason = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "non-string panic payload".to_string()
    };
    AppError::InternalError(format!("handler panicked: {reason}")).into_response()
}

/// Give the timeout layer's empty 408 a `{"detail"}` body.
///
/// Handlers never answer 408 themselves, and every body they send is JSON.
async fn timeout_response(response: Response) -> Response {
    let bare = !response.headers().contains_key(header::CONTENT_TYPE);
    if response.status() != StatusCode::REQUEST_TIMEOUT || !bare {
        return response;
    }
    tracing::warn!("Request timed out");
    AppError::Rejected {
        status: StatusCode::REQUEST_TIMEOUT,
        detail: "Request timed out".into(),
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn detail(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        body["detail"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn panic_answers_json_500() {
        let resp = panic_response(Box::new("boom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail(resp).await, "An internal error occurred");
    }

    #[tokio::test]
    async fn bare_timeout_gets_json_body() {
        let mut bare = Response::new(Body::empty());
        *bare.status_mut() = StatusCode::REQUEST_TIMEOUT;
        let resp = timeout_response(bare).await;
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(detail(resp).await, "Request timed out");
    }

    #[tokio::test]
    async fn handler_bodies_pass_through() {
        let rejected = AppError::Rejected {
            status: StatusCode::REQUEST_TIMEOUT,
            detail: "slow upstream".into(),
        };
        let resp = timeout_response(rejected.into_response()).await;
        assert_eq!(detail(resp).await, "slow upstream");
    }
}
