//! Administrative abort and forced failure.

use crate::error::{Error, JobError, Result};
use crate::state_machine::{self, TransitionTrigger};
use crate::types::{Event, JobId, JobStatus};

use super::ValidationPipeline;

impl ValidationPipeline {
    /// Mark a job `Failed` on behalf of an operator
    ///
    /// Units that have not reached the oracle yet are skipped, units already past
    /// that point finish and record their verdicts. Aborting a job that is already
    /// terminal is rejected with [`JobError::IllegalTransition`].
    pub async fn abort_job(&self, job_id: &JobId, reason: Option<String>) -> Result<()> {
        let reason = reason.unwrap_or_else(|| "aborted".to_string());
        let job = self.require_job(job_id).await?;

        if job.status.is_terminal() || !self.fail_job(job_id, &reason).await? {
            let current = self.require_job(job_id).await?.status;
            let err = JobError::IllegalTransition {
                id: job_id.clone(),
                from: current,
                to: JobStatus::Failed,
            };
            tracing::error!(job_id = %job_id, error = %err, "Abort rejected");
            return Err(err.into());
        }

        tracing::info!(job_id = %job_id, %reason, "Job aborted");
        Ok(())
    }

    /// Move a non-terminal job to `Failed`, stop its dispatch and notify
    ///
    /// Returns false when the job was already terminal, in which case nothing
    /// changes.
    pub(crate) async fn fail_job(&self, job_id: &JobId, reason: &str) -> Result<bool> {
        loop {
            let job = self.require_job(job_id).await?;
            if job.status.is_terminal() {
                return Ok(false);
            }

            let to = state_machine::transition(
                job_id,
                job.status,
                JobStatus::Failed,
                TransitionTrigger::Abort,
            )?;
            let result = self
                .store_call(|| {
                    self.store
                        .transition_status(job_id, job.status, to, Some(reason))
                })
                .await;

            match result {
                Ok(()) => break,
                // Pending moved to Processing under us, try again from there
                Err(Error::Job(JobError::StatusConflict { actual, .. })) if !actual.is_terminal() => {
                    continue;
                }
                Err(Error::Job(JobError::StatusConflict { .. })) => return Ok(false),
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(job_id = %job_id, %reason, "Job failed");

        if let Some(token) = self.execution.active_jobs.lock().await.get(job_id) {
            token.cancel();
        }

        let job = self.require_job(job_id).await?;
        self.emit_event(Event::JobFinished {
            id: job_id.clone(),
            status: JobStatus::Failed,
            summary: job.summary(),
        });
        self.notify_once(job_id).await;

        Ok(true)
    }

    /// Escalate a persistence failure that outlived its retry budget
    ///
    /// Job errors (unknown job, conflicting transitions) are logic problems and
    /// only logged; everything else fails the job.
    pub(crate) async fn fail_on_persistence_error(&self, job_id: &JobId, error: &Error) {
        if matches!(error, Error::Job(_)) {
            return;
        }
        let reason = format!("store unavailable: {}", error);
        if let Err(e) = self.fail_job(job_id, &reason).await {
            tracing::error!(
                job_id = %job_id,
                error = %e,
                "Could not mark job failed after persistence error"
            );
        }
    }
}
