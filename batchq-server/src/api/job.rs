//! Job API Handlers
//!
//! HTTP endpoints for submission, status, statistics, manual admission and
//! cancellation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use batchq_core::domain::job::Job;
use batchq_core::domain::stats::QueueStats;
use batchq_core::dto::job::{
    CancelResponse, JobIdQuery, ProcessNextResponse, SubmitJob, SubmitResponse,
};

use crate::api::error::{ApiError, ApiResult};
use crate::service::JobService;

/// POST /submit
/// Create a pending job and trigger admission
pub async fn submit_job(
    State(service): State<Arc<JobService>>,
    body: Result<Json<SubmitJob>, JsonRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    tracing::debug!("Submitting job with {} file(s)", req.files.len());

    let resp = service.submit(req).await?;
    Ok(Json(resp))
}

/// GET /status?jobId=ID
pub async fn get_status(
    State(service): State<Arc<JobService>>,
    query: Result<Query<JobIdQuery>, QueryRejection>,
) -> ApiResult<Json<Job>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    tracing::debug!("Getting job: {}", query.job_id);

    let job = service.status(query.job_id).await?;
    Ok(Json(job))
}

/// GET /queue-stats
pub async fn queue_stats(State(service): State<Arc<JobService>>) -> ApiResult<Json<QueueStats>> {
    let stats = service.queue_stats().await?;
    Ok(Json(stats))
}

/// POST /process-next
/// Run an admission pass now
pub async fn process_next(
    State(service): State<Arc<JobService>>,
) -> ApiResult<Json<ProcessNextResponse>> {
    let resp = service.process_next().await?;
    Ok(Json(resp))
}

/// POST /cancel?jobId=ID
/// Cancel a job processing in this instance
pub async fn cancel_job(
    State(service): State<Arc<JobService>>,
    query: Result<Query<JobIdQuery>, QueryRejection>,
) -> ApiResult<Json<CancelResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    tracing::info!("Cancelling job: {}", query.job_id);

    let resp = service.cancel(query.job_id).await?;
    Ok(Json(resp))
}
