//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the mailsieve REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mailsieve REST API",
        version = "0.1.0",
        description = "Submit bulk email-address validation jobs, follow their progress and read per-address verdicts",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::submit_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::list_verdicts,
        crate::api::routes::unprocessed_addresses,
        crate::api::routes::job_report,
        crate::api::routes::abort_job,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::JobStatus,
        crate::types::ReasonCode,
        crate::types::ValidationJob,
        crate::types::ValidationVerdict,
        crate::types::JobSummary,
        crate::types::IngestedFile,
        crate::types::ReasonCount,
        crate::types::JobReport,
        crate::types::WebhookPayload,
        crate::types::Event,

        crate::config::WebhookConfig,
        crate::config::WebhookEvent,
        crate::config::ApiConfig,
        crate::config::RetryConfig,

        crate::api::routes::SubmitJobRequest,
        crate::api::routes::SubmitJobResponse,
        crate::api::routes::ListJobsQuery,
        crate::api::routes::AbortJobRequest,
        crate::api::routes::UnprocessedResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Validation jobs - Submit address lists, inspect progress, verdicts and reports, abort"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
