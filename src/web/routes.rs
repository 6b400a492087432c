use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// Service routes - liveness
pub fn service_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::root))
        .route("/health", get(handlers::api::health))
}

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Full pipeline
            .route("/query", post(handlers::api::query))
            // Single stages
            .route("/generate-sql", post(handlers::api::generate_sql))
            .route("/classify-intent", post(handlers::api::classify_intent))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
