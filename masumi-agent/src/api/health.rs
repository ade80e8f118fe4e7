//! Health Check API Handler
//!
//! Simple health check endpoint for monitoring.

use axum::Json;
use masumi_core::dto::agent::HealthCheck;

/// GET /health
/// Health check endpoint
pub async fn health_check() -> Json<HealthCheck> {
    tracing::debug!("Health check");
    Json(HealthCheck::healthy())
}
