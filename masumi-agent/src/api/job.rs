//! Job API Handlers
//!
//! HTTP endpoints for starting jobs and polling their status.

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use masumi_core::dto::job::{JobStatusResponse, StartJobRequest, StartJobResponse, StatusQuery};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::service::JobService;

/// POST /start_job
/// Create a payment request and a job awaiting that payment
pub async fn start_job(
    State(service): State<Arc<JobService>>,
    payload: Result<Json<StartJobRequest>, JsonRejection>,
) -> ApiResult<Json<StartJobResponse>> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::warn!("Rejected start_job body: {}", rejection.body_text());
        ApiError::BadRequest(rejection.body_text())
    })?;

    tracing::info!(
        "Starting job for purchaser: {}",
        req.identifier_from_purchaser
    );

    let response = service.start_job(req).await?;

    Ok(Json(response))
}

/// GET /status?job_id=<id>
/// Get the current status of a job
pub async fn get_status(
    State(service): State<Arc<JobService>>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult<Json<JobStatusResponse>> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    tracing::info!("Checking status for job {}", query.job_id);

    let status = service.get_status(&query.job_id).await.map_err(|e| {
        tracing::warn!("Status check for job {} failed: {}", query.job_id, e);
        ApiError::from(e)
    })?;

    Ok(Json(status))
}
