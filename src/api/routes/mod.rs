//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job submission, inspection and abort
//! - [`system`] - Health, events, OpenAPI

use crate::types::JobStatus;
use serde::{Deserialize, Serialize};

mod jobs;
mod system;

pub use jobs::*;
pub use system::*;

/// Request body for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitJobRequest {
    /// Job identifier (generated when omitted)
    #[serde(default)]
    pub job_id: Option<String>,
    /// Reference to the uploaded source file
    #[serde(default)]
    pub source_location: String,
    /// Address count reported by the ingestion layer (defaults to the list length)
    #[serde(default)]
    pub total_addresses: Option<u64>,
    /// Decoded address list
    pub addresses: Vec<String>,
}

/// Response for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitJobResponse {
    /// Identifier of the accepted job
    pub job_id: String,
}

/// Query parameters for GET /jobs
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListJobsQuery {
    /// Only return jobs in this status
    pub status: Option<JobStatus>,
}

/// Request body for POST /jobs/:id/abort
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AbortJobRequest {
    /// Why the job is being aborted
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response for GET /jobs/:id/unprocessed
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UnprocessedResponse {
    /// Job identifier
    pub job_id: String,
    /// Addresses that never received a verdict
    pub addresses: Vec<String>,
}
