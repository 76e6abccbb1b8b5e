//! Durable job store capability
//!
//! All coordination between validation units goes through this trait. The
//! pipeline never keeps authoritative job state in memory; it reads counts and
//! status back from the store and moves status only by compare-and-set.

use crate::Result;
use crate::types::{JobId, JobStatus, ReasonCount, ValidationJob, ValidationVerdict};
use async_trait::async_trait;

/// Persisted jobs, address sequences and verdicts
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// Persist a new job in `Pending` with its distinct address sequence
    async fn insert_job(&self, job: &ValidationJob, addresses: &[String]) -> Result<()>;

    /// Insert a job record or refresh its descriptive fields
    async fn upsert_job(&self, job: &ValidationJob) -> Result<()>;

    /// Fetch a job
    async fn get_job(&self, id: &JobId) -> Result<Option<ValidationJob>>;

    /// List jobs, optionally filtered by status
    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<ValidationJob>>;

    /// Idempotent upsert keyed by `(job, address)`, last-write-wins on `checked_at`
    async fn upsert_verdict(&self, id: &JobId, verdict: &ValidationVerdict) -> Result<bool>;

    /// Verdicts recorded for a job
    async fn list_verdicts(&self, id: &JobId) -> Result<Vec<ValidationVerdict>>;

    /// Addresses of the job without a verdict, in ingestion order
    async fn pending_addresses(&self, id: &JobId) -> Result<Vec<String>>;

    /// Re-derive counts from the distinct verdict set and return the job
    async fn recompute_counts(&self, id: &JobId) -> Result<ValidationJob>;

    /// Compare-and-set the job status
    async fn transition_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        to: JobStatus,
        reason: Option<&str>,
    ) -> Result<()>;

    /// First caller for a terminal job gets `true`, everyone else `false`
    async fn claim_notification(&self, id: &JobId) -> Result<bool>;

    /// Give a claimed notification back after a failed delivery
    async fn release_notification(&self, id: &JobId) -> Result<()>;

    /// Verdict counts per reason code
    async fn reason_counts(&self, id: &JobId) -> Result<Vec<ReasonCount>>;
}
