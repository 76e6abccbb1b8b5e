//! Result aggregation: verdict recording, count recomputation and the terminal
//! decision.
//!
//! Counts are always re-derived from the persisted verdict set, so duplicate and
//! out-of-order deliveries converge on the same numbers. The terminal transition
//! is a compare-and-set on the stored status; when several units see the last
//! verdict at once exactly one of them wins and notifies.

use crate::error::{Error, JobError, Result};
use crate::state_machine::{self, TransitionTrigger};
use crate::types::{Event, JobId, JobStatus, ValidationJob, ValidationVerdict};

use super::ValidationPipeline;

impl ValidationPipeline {
    /// Record a verdict and evaluate the job's terminal condition
    ///
    /// Returns the terminal status when this call moved the job into it.
    pub async fn on_verdict(
        &self,
        job_id: &JobId,
        verdict: ValidationVerdict,
    ) -> Result<Option<JobStatus>> {
        let written = self
            .store_call(|| self.store.upsert_verdict(job_id, &verdict))
            .await?;
        if !written {
            tracing::debug!(
                job_id = %job_id,
                address = %verdict.address,
                "Verdict not written (superseded, or job already finalized)"
            );
        }

        let job = self
            .store_call(|| self.store.recompute_counts(job_id))
            .await?;

        tracing::debug!(
            job_id = %job_id,
            address = %verdict.address,
            reason = ?verdict.reason,
            processed = job.processed_count,
            total = job.total_addresses,
            "Verdict recorded"
        );
        self.emit_event(Event::Progress {
            id: job_id.clone(),
            processed: job.processed_count,
            total: job.total_addresses,
        });

        self.evaluate_terminal(&job).await
    }

    /// Recompute counts and finalize the job if every address has a verdict
    pub(crate) async fn finalize_if_complete(&self, job_id: &JobId) -> Result<Option<JobStatus>> {
        let job = self
            .store_call(|| self.store.recompute_counts(job_id))
            .await?;
        self.evaluate_terminal(&job).await
    }

    async fn evaluate_terminal(&self, job: &ValidationJob) -> Result<Option<JobStatus>> {
        if job.status != JobStatus::Processing || !job.is_fully_processed() {
            return Ok(None);
        }

        let target =
            state_machine::terminal_decision(job.total_addresses, job.valid_count, job.invalid_count);
        let to = match state_machine::transition(
            &job.id,
            job.status,
            target,
            TransitionTrigger::TerminalDecision,
        ) {
            Ok(to) => to,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Coordination violation");
                return Err(e.into());
            }
        };

        let result = self
            .store_call(|| {
                self.store
                    .transition_status(&job.id, JobStatus::Processing, to, None)
            })
            .await;

        match result {
            Ok(()) => {
                let summary = job.summary();
                tracing::info!(
                    job_id = %job.id,
                    status = %to,
                    valid = summary.valid_count,
                    invalid = summary.invalid_count,
                    "Job finished"
                );
                self.emit_event(Event::JobFinished {
                    id: job.id.clone(),
                    status: to,
                    summary,
                });
                self.notify_once(&job.id).await;
                Ok(Some(to))
            }
            // Another unit (or an abort) got there first
            Err(Error::Job(JobError::StatusConflict { actual, .. })) if actual.is_terminal() => {
                tracing::debug!(job_id = %job.id, status = %actual, "Job already finalized");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Deliver the terminal notification if no one has claimed it yet
    ///
    /// The claim is persisted before delivery, so concurrent finalizers never
    /// send twice. A failed delivery gives the claim back and the next
    /// [`restore`](Self::restore) tries again. Transport failures are logged and
    /// published, they never change the job outcome.
    pub(crate) async fn notify_once(&self, job_id: &JobId) {
        let claimed = match self
            .store_call(|| self.store.claim_notification(job_id))
            .await
        {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to claim notification");
                return;
            }
        };
        if !claimed {
            tracing::debug!(job_id = %job_id, "Notification already claimed");
            return;
        }

        let job = match self.require_job(job_id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to load job for notification");
                return;
            }
        };

        if let Err(e) = self
            .notifier
            .notify(
                job_id,
                job.status,
                &job.summary(),
                job.failure_reason.as_deref(),
            )
            .await
        {
            tracing::warn!(job_id = %job_id, error = %e, "Notification delivery failed, will retry on restore");
            if let Err(release) = self
                .store_call(|| self.store.release_notification(job_id))
                .await
            {
                tracing::error!(job_id = %job_id, error = %release, "Failed to release notification claim");
            }
            self.emit_event(Event::NotificationFailed {
                id: job_id.clone(),
                error: e.to_string(),
            });
        }
    }
}
