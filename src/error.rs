//! Error types for mailsieve
//!
//! The taxonomy maps onto how the pipeline reacts:
//! - malformed addresses never become errors, they become `SyntaxInvalid` verdicts
//! - [`OracleError`] and [`ResolveError`] are transient provider failures, retried and
//!   then downgraded to a low-confidence verdict
//! - [`DatabaseError`] / [`Error::Sqlx`] are persistence failures, retried and then
//!   escalated to a failed job
//! - [`JobError::IllegalTransition`] is a coordination violation and is always surfaced

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{JobId, JobStatus};

/// Result type alias for mailsieve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mailsieve
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pipeline.batch_size")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Job lifecycle error
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Deliverability oracle error
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Domain resolution error
    #[error("resolver error: {0}")]
    Resolve(#[from] ResolveError),

    /// Ingested file is inconsistent (declared count does not match the sequence)
    #[error("invalid ingestion: {0}")]
    InvalidIngestion(String),

    /// A store call did not finish within the configured timeout
    #[error("store operation timed out after {0:?}")]
    StoreTimeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Job lifecycle errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Job does not exist in the store
    #[error("job {id} not found")]
    NotFound {
        /// The job ID that was not found
        id: JobId,
    },

    /// A job with this ID was already ingested
    #[error("job {id} already exists")]
    AlreadyExists {
        /// The duplicate job ID
        id: JobId,
    },

    /// Verdict references an address that is not part of the job
    #[error("address {address:?} is not part of job {id}")]
    UnknownAddress {
        /// The job ID
        id: JobId,
        /// The address with no matching ingested entry
        address: String,
    },

    /// Transition rejected by the state machine (coordination violation)
    #[error("illegal transition for job {id}: {from} -> {to}")]
    IllegalTransition {
        /// The job ID
        id: JobId,
        /// Status the job was in
        from: JobStatus,
        /// Status that was requested
        to: JobStatus,
    },

    /// Compare-and-set lost: the stored status was not the expected one
    #[error("job {id} status changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        /// The job ID
        id: JobId,
        /// Status the caller expected
        expected: JobStatus,
        /// Status actually stored
        actual: JobStatus,
    },
}

/// Errors surfaced by the deliverability oracle
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    /// Provider throttled the call (HTTP 429 or equivalent)
    #[error("oracle throttled the request")]
    Throttled,

    /// Call exceeded the per-call timeout
    #[error("oracle call timed out")]
    Timeout,

    /// Provider-side failure (5xx, connection refused, ...)
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Provider refused the request itself (bad identity, malformed request)
    #[error("oracle rejected the request: {0}")]
    RequestRejected(String),
}

/// Errors surfaced by the domain-resolution collaborator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    /// Lookup exceeded its timeout
    #[error("domain lookup timed out")]
    Timeout,

    /// Resolver infrastructure failure (SERVFAIL, no upstream, ...)
    #[error("domain lookup failed: {0}")]
    Failed(String),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job job-1 not found",
///     "details": {
///       "job_id": "job-1"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidIngestion(_) => 422,

            Error::Job(JobError::NotFound { .. }) => 404,
            Error::Job(JobError::AlreadyExists { .. }) => 409,
            Error::Job(JobError::UnknownAddress { .. }) => 422,
            Error::Job(JobError::IllegalTransition { .. }) => 409,
            Error::Job(JobError::StatusConflict { .. }) => 409,

            Error::Database(DatabaseError::NotFound(_)) => 404,
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::Oracle(_) => 502,
            Error::Resolve(_) => 502,
            Error::Network(_) => 502,

            Error::ShuttingDown => 503,
            Error::StoreTimeout(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::AlreadyExists { .. } => "job_exists",
                JobError::UnknownAddress { .. } => "unknown_address",
                JobError::IllegalTransition { .. } => "illegal_transition",
                JobError::StatusConflict { .. } => "status_conflict",
            },
            Error::Oracle(_) => "oracle_error",
            Error::Resolve(_) => "resolver_error",
            Error::InvalidIngestion(_) => "invalid_ingestion",
            Error::StoreTimeout(_) => "store_timeout",
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) | Error::Job(JobError::AlreadyExists { id }) => {
                Some(serde_json::json!({ "job_id": id }))
            }
            Error::Job(JobError::IllegalTransition { id, from, to }) => Some(serde_json::json!({
                "job_id": id,
                "from": from,
                "to": to,
            })),
            Error::Job(JobError::StatusConflict {
                id,
                expected,
                actual,
            }) => Some(serde_json::json!({
                "job_id": id,
                "expected": expected,
                "actual": actual,
            })),
            Error::Job(JobError::UnknownAddress { id, address }) => Some(serde_json::json!({
                "job_id": id,
                "address": address,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
