//! Fan-out: batch planning and dispatch of validation units.
//!
//! Every address becomes its own unit. Batches only bound how much work is
//! handed to the scheduler at once; within and across batches units run
//! independently, so one slow address never holds up the rest of its job.

use crate::error::Result;
use crate::state_machine::{self, TransitionTrigger};
use crate::types::{AddressValidationUnit, BatchPlan, Event, JobId, JobStatus};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::ValidationPipeline;

/// Split an address sequence into fixed-size batches of units
///
/// A `batch_size` of zero is treated as one.
pub fn plan_batches(
    job_id: &JobId,
    addresses: &[String],
    batch_size: usize,
    attempt: u32,
) -> BatchPlan {
    let batches = addresses
        .chunks(batch_size.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|address| AddressValidationUnit {
                    job_id: job_id.clone(),
                    address: address.clone(),
                    attempt,
                })
                .collect()
        })
        .collect();

    BatchPlan {
        job_id: job_id.clone(),
        batches,
    }
}

impl ValidationPipeline {
    /// Plan the first dispatch of a freshly ingested job
    pub fn enqueue(&self, job_id: &JobId, addresses: &[String]) -> BatchPlan {
        plan_batches(job_id, addresses, self.config.pipeline.batch_size, 0)
    }

    /// Re-derive the remaining work of a job from the store
    ///
    /// The plan covers exactly the addresses without a verdict.
    pub async fn resume_plan(&self, job_id: &JobId) -> Result<BatchPlan> {
        let pending = self
            .store_call(|| self.store.pending_addresses(job_id))
            .await?;
        Ok(plan_batches(
            job_id,
            &pending,
            self.config.pipeline.batch_size,
            1,
        ))
    }

    /// Start a job task for the plan
    ///
    /// The task owns the plan, moves the job to Processing, runs its units and
    /// enforces the job deadline. A job that already has a running task is left
    /// alone.
    pub(crate) async fn dispatch(&self, plan: BatchPlan) {
        let job_id = plan.job_id.clone();
        let cancel_token = CancellationToken::new();

        {
            let mut active = self.execution.active_jobs.lock().await;
            if active.contains_key(&job_id) {
                tracing::debug!(job_id = %job_id, "Job already running, not dispatching again");
                return;
            }
            active.insert(job_id.clone(), cancel_token.clone());
        }

        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run_job(plan, cancel_token).await;

            let mut active = pipeline.execution.active_jobs.lock().await;
            active.remove(&job_id);
        });
    }

    async fn run_job(&self, plan: BatchPlan, cancel_token: CancellationToken) {
        let job_id = plan.job_id.clone();
        let remaining = match self.deadline_remaining(&job_id).await {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Could not load job for dispatch");
                return;
            }
        };

        let run = self.run_plan(plan, cancel_token.clone());
        tokio::pin!(run);

        tokio::select! {
            _ = &mut run => {}
            _ = tokio::time::sleep(remaining) => {
                tracing::warn!(job_id = %job_id, "Job deadline exceeded, force-finalizing");
                cancel_token.cancel();
                if let Err(e) = self.fail_job(&job_id, "deadline exceeded").await {
                    tracing::debug!(job_id = %job_id, error = %e, "Deadline finalization skipped");
                }
                // Units already past their cancellation check still record verdicts
                run.await;
            }
        }
    }

    /// Time left before the job's deadline, measured from ingestion
    async fn deadline_remaining(&self, job_id: &JobId) -> Result<Duration> {
        let job = self.require_job(job_id).await?;
        let elapsed = (chrono::Utc::now() - job.created_at)
            .to_std()
            .unwrap_or_default();
        Ok(self.config.pipeline.job_deadline.saturating_sub(elapsed))
    }

    async fn run_plan(&self, plan: BatchPlan, cancel_token: CancellationToken) {
        let job_id = plan.job_id.clone();

        match self.mark_processing(&job_id).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to start job");
                self.fail_on_persistence_error(&job_id, &e).await;
                return;
            }
        }

        let batch_count = plan.batches.len();
        let mut units = JoinSet::new();

        'dispatch: for (index, batch) in plan.batches.into_iter().enumerate() {
            tracing::debug!(
                job_id = %job_id,
                batch = index + 1,
                batches = batch_count,
                units = batch.len(),
                "Dispatching batch"
            );

            for unit in batch {
                let permit = tokio::select! {
                    _ = cancel_token.cancelled() => break 'dispatch,
                    permit = self.execution.unit_limit.clone().acquire_owned() => permit,
                };
                let Ok(permit) = permit else {
                    // Semaphore closed, nothing more can run
                    break 'dispatch;
                };

                let pipeline = self.clone();
                let token = cancel_token.clone();
                units.spawn(async move {
                    let _permit = permit;
                    pipeline.run_unit(unit, token).await;
                });
            }
        }

        while let Some(joined) = units.join_next().await {
            if let Err(e) = joined {
                tracing::error!(job_id = %job_id, error = %e, "Validation unit panicked");
            }
        }

        if cancel_token.is_cancelled() {
            tracing::debug!(job_id = %job_id, "Job dispatch stopped early");
            return;
        }

        // Covers empty jobs and resumed jobs whose verdicts were all recorded
        // before the restart
        if let Err(e) = self.finalize_if_complete(&job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to finalize job");
            self.fail_on_persistence_error(&job_id, &e).await;
        }
    }

    /// Move the job from Pending to Processing on its first dispatch
    ///
    /// Returns false when the job is already terminal and nothing should run.
    async fn mark_processing(&self, job_id: &JobId) -> Result<bool> {
        let job = self.require_job(job_id).await?;
        match job.status {
            JobStatus::Processing => Ok(true),
            status if status.is_terminal() => {
                tracing::debug!(job_id = %job_id, %status, "Job already terminal, nothing to dispatch");
                Ok(false)
            }
            _ => {
                let to = state_machine::transition(
                    job_id,
                    JobStatus::Pending,
                    JobStatus::Processing,
                    TransitionTrigger::FirstDispatch,
                )?;
                match self
                    .store_call(|| {
                        self.store
                            .transition_status(job_id, JobStatus::Pending, to, None)
                    })
                    .await
                {
                    Ok(()) => {
                        tracing::info!(job_id = %job_id, "Job processing started");
                        self.emit_event(Event::JobStarted { id: job_id.clone() });
                        Ok(true)
                    }
                    Err(crate::Error::Job(crate::error::JobError::StatusConflict {
                        actual, ..
                    })) => Ok(actual == JobStatus::Processing),
                    Err(e) => Err(e),
                }
            }
        }
    }
}
