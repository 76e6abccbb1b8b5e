//! # mailsieve
//!
//! Bulk email-address validation as durable, resumable jobs.
//!
//! An ingested address list becomes a validation job. Every address is checked
//! independently (grammar, domain existence, mailbox acceptance through a
//! deliverability oracle) and the per-address verdicts are folded back into one
//! job outcome: `Completed`, `PartiallyCompleted` or `Failed`.
//!
//! ## Design
//!
//! - **Store-coordinated** - job state lives in the durable store only; counts are
//!   recomputed from persisted verdicts and status moves by compare-and-set
//! - **Resumable** - after a restart, unfinished jobs continue with exactly the
//!   addresses that still lack a verdict
//! - **Bounded** - retries, timeouts, concurrency and the oracle call rate are
//!   all configured budgets
//! - **Event-driven** - consumers subscribe to lifecycle events
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailsieve::{Config, IngestedFile, JobId, ValidationPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.oracle.endpoint = "https://oracle.example.com".to_string();
//!     config.oracle.identity = "mail.example.com".to_string();
//!
//!     let pipeline = ValidationPipeline::new(config).await?;
//!
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     pipeline
//!         .submit_job(IngestedFile {
//!             job_id: JobId::generate(),
//!             source_location: "uploads/list.csv".to_string(),
//!             total_addresses: 2,
//!             addresses: vec!["a@example.com".into(), "b@example.org".into()],
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// SQLite job store
pub mod db;
/// Error types
pub mod error;
/// Validation job pipeline (decomposed into focused submodules)
pub mod pipeline;
/// Oracle call budget with token bucket
pub mod rate_limiter;
/// Retry logic with exponential backoff
pub mod retry;
/// Job lifecycle rules
pub mod state_machine;
/// Durable job store capability
pub mod store;
/// Core types and events
pub mod types;
/// Per-address validation checks
pub mod validator;

// Re-export commonly used types
pub use config::{Config, RetryConfig, WebhookConfig, WebhookEvent};
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, JobError, OracleError, ResolveError, Result,
    ToHttpStatus,
};
pub use pipeline::{Notifier, PipelineComponents, ValidationPipeline, WebhookNotifier};
pub use store::JobRecordStore;
pub use types::{
    Event, IngestedFile, JobId, JobReport, JobStatus, JobSummary, ReasonCode, ValidationJob,
    ValidationVerdict,
};
pub use validator::{
    AddressValidator, DeliverabilityOracle, DnsResolver, DomainResolver, HttpOracle,
    MailboxCheck, MailboxOutcome,
};

/// Run the pipeline until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mailsieve::{Config, ValidationPipeline, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = ValidationPipeline::new(Config::default()).await?;
///     let _api = pipeline.spawn_api_server();
///
///     run_with_shutdown(pipeline).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(pipeline: ValidationPipeline) -> Result<()> {
    wait_for_signal().await;
    pipeline.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
