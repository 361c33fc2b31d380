use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{
    handlers::{auth, health},
    server::IdentityServer,
};

/// Create health check routes
pub fn health_routes() -> Router<IdentityServer> {
    Router::new().route("/health", get(health::health_check))
}

/// Create authentication and user management routes
pub fn auth_routes() -> Router<IdentityServer> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/search", get(auth::search))
        .route("/all", get(auth::list))
        .route("/me", get(auth::me))
        .route("/:user_id", put(auth::update).delete(auth::delete))
}

/// Create API v1 routes
pub fn api_v1_routes() -> Router<IdentityServer> {
    Router::new().nest("/auth", auth_routes())
}

/// Create all application routes
pub fn create_routes() -> Router<IdentityServer> {
    Router::new()
        .merge(health_routes())
        .nest("/api/v1", api_v1_routes())
}
