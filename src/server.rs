//! HTTP transport: `POST /codesearch` and `GET /health` over axum.
//!
//! The transport only knows the [`CodeSearchService`] capability, so tests
//! can mount a double in place of the real orchestrator.

use crate::services::CodeSearchService;
use crate::types::CodeSearchRequest;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Shared handler state.
pub type AppState = Arc<dyn CodeSearchService>;

/// Builds the router for a search service.
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/codesearch", post(codesearch_handler))
        .route("/health", get(health_handler))
        .with_state(service)
}

async fn codesearch_handler(
    State(service): State<AppState>,
    payload: Result<Json<CodeSearchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected codesearch request body");
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let started = Instant::now();
    let result = service.search(request).await;
    let elapsed = started.elapsed();

    match result {
        Ok(reply) => {
            tracing::info!(
                elapsed = ?elapsed,
                files = reply.matches.len(),
                snippets = reply.snippet_count(),
                "codesearch"
            );
            (StatusCode::OK, Json(reply)).into_response()
        }
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::error!(elapsed = ?elapsed, code = e.code(), error = %e, "codesearch failed");
            (status, e.to_string()).into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Binds `addr` and serves until Ctrl-C.
///
/// # Errors
///
/// Returns an I/O error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, service: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "codesearch server listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
