//! Read-side queries and job reports.

use crate::error::{JobError, Result};
use crate::types::{JobId, JobReport, JobStatus, ValidationJob, ValidationVerdict};

use super::ValidationPipeline;

impl ValidationPipeline {
    /// Fetch a job, if it exists
    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<ValidationJob>> {
        self.store_call(|| self.store.get_job(job_id)).await
    }

    /// Fetch a job, failing with [`JobError::NotFound`] if it does not exist
    pub(crate) async fn require_job(&self, job_id: &JobId) -> Result<ValidationJob> {
        self.get_job(job_id)
            .await?
            .ok_or_else(|| JobError::NotFound { id: job_id.clone() }.into())
    }

    /// List jobs ordered by ingestion time, optionally filtered by status
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<ValidationJob>> {
        self.store_call(|| self.store.list_jobs(status)).await
    }

    /// Verdicts recorded for a job, in ingestion order
    pub async fn list_verdicts(&self, job_id: &JobId) -> Result<Vec<ValidationVerdict>> {
        self.require_job(job_id).await?;
        self.store_call(|| self.store.list_verdicts(job_id)).await
    }

    /// Addresses of a job that never received a verdict
    ///
    /// Non-empty only while the job runs, or after it was aborted or hit its
    /// deadline.
    pub async fn unprocessed_addresses(&self, job_id: &JobId) -> Result<Vec<String>> {
        self.require_job(job_id).await?;
        self.store_call(|| self.store.pending_addresses(job_id))
            .await
    }

    /// The job with its per-reason verdict breakdown
    pub async fn job_report(&self, job_id: &JobId) -> Result<JobReport> {
        let job = self.require_job(job_id).await?;
        let reasons = self
            .store_call(|| self.store.reason_counts(job_id))
            .await?;

        Ok(JobReport {
            unprocessed_count: job.total_addresses.saturating_sub(job.processed_count),
            job,
            reasons,
        })
    }
}
