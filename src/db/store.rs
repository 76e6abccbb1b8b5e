//! [`JobRecordStore`] backed by SQLite.

use crate::Result;
use crate::store::JobRecordStore;
use crate::types::{JobId, JobStatus, ReasonCount, ValidationJob, ValidationVerdict};
use async_trait::async_trait;

use super::Database;

#[async_trait]
impl JobRecordStore for Database {
    async fn insert_job(&self, job: &ValidationJob, addresses: &[String]) -> Result<()> {
        Database::insert_job(self, job, addresses).await
    }

    async fn upsert_job(&self, job: &ValidationJob) -> Result<()> {
        Database::upsert_job(self, job).await
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<ValidationJob>> {
        Database::get_job(self, id).await
    }

    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<ValidationJob>> {
        Database::list_jobs(self, status).await
    }

    async fn upsert_verdict(&self, id: &JobId, verdict: &ValidationVerdict) -> Result<bool> {
        Database::upsert_verdict(self, id, verdict).await
    }

    async fn list_verdicts(&self, id: &JobId) -> Result<Vec<ValidationVerdict>> {
        Database::list_verdicts(self, id).await
    }

    async fn pending_addresses(&self, id: &JobId) -> Result<Vec<String>> {
        Database::pending_addresses(self, id).await
    }

    async fn recompute_counts(&self, id: &JobId) -> Result<ValidationJob> {
        Database::recompute_counts(self, id).await
    }

    async fn transition_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        to: JobStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        Database::transition_status(self, id, expected, to, reason).await
    }

    async fn claim_notification(&self, id: &JobId) -> Result<bool> {
        Database::claim_notification(self, id).await
    }

    async fn release_notification(&self, id: &JobId) -> Result<()> {
        Database::release_notification(self, id).await
    }

    async fn reason_counts(&self, id: &JobId) -> Result<Vec<ReasonCount>> {
        Database::reason_counts(self, id).await
    }
}
