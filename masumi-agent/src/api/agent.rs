//! Agent API Handlers
//!
//! Static metadata and availability of the agent.

use axum::{Json, extract::State};
use masumi_core::dto::agent::{AgentAvailability, InputSchema};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::service::JobService;

/// GET /input_schema
/// Describe the input fields a job accepts
pub async fn input_schema() -> Json<InputSchema> {
    tracing::info!("Input schema requested");
    Json(InputSchema::text_task())
}

/// GET /availability
/// Report whether the agent accepts new jobs
pub async fn availability(
    State(service): State<Arc<JobService>>,
) -> ApiResult<Json<AgentAvailability>> {
    tracing::info!("Availability check");
    Ok(Json(service.availability().await?))
}
