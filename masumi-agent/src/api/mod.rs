//! API Module
//!
//! HTTP API layer for the agent.
//! Each submodule handles endpoints for a specific concern.

pub mod agent;
pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::JobService;

/// Create the main API router with all endpoints
pub fn create_router(service: Arc<JobService>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/start_job", post(job::start_job))
        .route("/status", get(job::get_status))
        // Agent metadata
        .route("/input_schema", get(agent::input_schema))
        .route("/availability", get(agent::availability))
        // Add state and middleware
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
