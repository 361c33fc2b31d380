use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::server::IdentityServer;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub checks: HashMap<String, String>,
}

/// GET /health
///
/// Pings each configured backend. Returns 503 when any of them is down.
pub async fn health_check(State(server): State<IdentityServer>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = HashMap::new();
    let mut healthy = true;

    for (name, outcome) in [
        ("postgres", server.check_postgres().await),
        ("redis", server.check_redis().await),
    ] {
        let status = match outcome {
            None => "not_configured".to_string(),
            Some(Ok(())) => "healthy".to_string(),
            Some(Err(err)) => {
                warn!(backend = name, error = %err, "health check failed");
                healthy = false;
                "unhealthy".to_string()
            }
        };
        checks.insert(name.to_string(), status);
    }

    let (status_code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    (status_code, Json(response))
}
