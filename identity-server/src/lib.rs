//! Identity Server - HTTP delivery for the identity core
//!
//! Exposes registration, login/logout with cookie sessions, and user
//! management under `/api/v1/auth`, plus a `/health` probe.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use server::IdentityServer;

use axum::{extract::Request, Router};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router with all routes and middleware
pub fn create_app(server: IdentityServer) -> Router {
    let request_timeout = server.config.http.request_timeout();

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                // Dropping the handler future on timeout cancels in-flight store and cache I/O.
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(server)
}
