//! Job handlers.

use super::{
    AbortJobRequest, ListJobsQuery, SubmitJobRequest, SubmitJobResponse, UnprocessedResponse,
};
use crate::api::AppState;
use crate::error::Result;
use crate::types::{IngestedFile, JobId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// POST /jobs - Submit an ingested address list
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "jobs",
    request_body = SubmitJobRequest,
    responses(
        (status = 202, description = "Job accepted", body = SubmitJobResponse),
        (status = 409, description = "Job ID already used", body = crate::error::ApiError),
        (status = 422, description = "Declared count does not match the address list", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<impl IntoResponse> {
    let job_id = request.job_id.map(JobId::from).unwrap_or_else(JobId::generate);
    let file = IngestedFile {
        job_id,
        source_location: request.source_location,
        total_addresses: request
            .total_addresses
            .unwrap_or(request.addresses.len() as u64),
        addresses: request.addresses,
    };

    let id = state.pipeline.submit_job(file).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse { job_id: id.0 }),
    ))
}

/// GET /jobs - List jobs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "Jobs ordered by ingestion time", body = Vec<crate::types::ValidationJob>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<impl IntoResponse> {
    let jobs = state.pipeline.list_jobs(query.status).await?;
    Ok(Json(jobs))
}

/// GET /jobs/:id - Get a single job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job record", body = crate::types::ValidationJob),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let job = state.pipeline.require_job(&JobId::from(id)).await?;
    Ok(Json(job))
}

/// GET /jobs/:id/verdicts - Verdicts recorded so far
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/verdicts",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Verdicts in ingestion order", body = Vec<crate::types::ValidationVerdict>),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn list_verdicts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let verdicts = state.pipeline.list_verdicts(&JobId::from(id)).await?;
    Ok(Json(verdicts))
}

/// GET /jobs/:id/unprocessed - Addresses without a verdict
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/unprocessed",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Addresses left without a verdict", body = UnprocessedResponse),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn unprocessed_addresses(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let job_id = JobId::from(id);
    let addresses = state.pipeline.unprocessed_addresses(&job_id).await?;
    Ok(Json(UnprocessedResponse {
        job_id: job_id.0,
        addresses,
    }))
}

/// GET /jobs/:id/report - Job with per-reason verdict counts
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/report",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job report", body = crate::types::JobReport),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn job_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let report = state.pipeline.job_report(&JobId::from(id)).await?;
    Ok(Json(report))
}

/// POST /jobs/:id/abort - Administrative abort
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/abort",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    request_body(content = AbortJobRequest, description = "Optional abort reason"),
    responses(
        (status = 204, description = "Job marked failed"),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 409, description = "Job already terminal", body = crate::error::ApiError)
    )
)]
pub async fn abort_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Option<Json<AbortJobRequest>>,
) -> Result<impl IntoResponse> {
    let reason = request.and_then(|Json(body)| body.reason);
    state.pipeline.abort_job(&JobId::from(id), reason).await?;
    Ok(StatusCode::NO_CONTENT)
}
