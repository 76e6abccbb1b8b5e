//! Startup recovery and shutdown coordination.

use crate::error::Result;
use crate::types::{Event, JobStatus};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ValidationPipeline;

impl ValidationPipeline {
    /// Resume work left behind by a previous session
    ///
    /// Called automatically during construction:
    /// 1. Every non-terminal job is re-dispatched with a plan covering exactly
    ///    the addresses that still lack a verdict
    /// 2. Terminal jobs whose notification was never claimed are notified
    ///
    /// Returns the number of resumed jobs.
    pub async fn restore(&self) -> Result<usize> {
        let jobs = self.store_call(|| self.store.list_jobs(None)).await?;

        let mut resumed = 0;
        for job in jobs {
            if job.status.is_terminal() {
                if !job.notified {
                    tracing::info!(job_id = %job.id, status = %job.status, "Delivering missed notification");
                    self.notify_once(&job.id).await;
                }
                continue;
            }

            let plan = self.resume_plan(&job.id).await?;
            tracing::info!(
                job_id = %job.id,
                status = %job.status,
                remaining = plan.unit_count(),
                total = job.total_addresses,
                "Resuming unfinished job"
            );
            self.dispatch(plan).await;
            resumed += 1;
        }

        if resumed == 0 {
            tracing::debug!("No unfinished jobs to resume");
        } else {
            tracing::info!(resumed, "Job restoration complete");
        }
        Ok(resumed)
    }

    /// Gracefully shut down the pipeline
    ///
    /// 1. Stops accepting new jobs
    /// 2. Cancels dispatch of every running job (units already past their
    ///    cancellation check finish and record their verdicts)
    /// 3. Waits up to 30 seconds for job tasks to wind down
    /// 4. Marks a clean shutdown so the next start does not warn
    ///
    /// Interrupted jobs stay `Processing` in the store and are resumed on the next
    /// start.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.execution.accepting_new.store(false, Ordering::SeqCst);

        {
            let active = self.execution.active_jobs.lock().await;
            tracing::debug!(active_count = active.len(), "Cancelling running jobs");
            for token in active.values() {
                token.cancel();
            }
        }

        let shutdown_timeout = Duration::from_secs(30);
        if tokio::time::timeout(shutdown_timeout, self.wait_for_active_jobs())
            .await
            .is_err()
        {
            tracing::warn!("Timeout waiting for jobs to stop, proceeding with shutdown");
        } else {
            tracing::info!("All running jobs stopped");
        }

        if let Some(db) = &self.db
            && let Err(e) = db.set_clean_shutdown().await
        {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Jobs currently being executed by this process
    pub async fn active_job_count(&self) -> usize {
        self.execution.active_jobs.lock().await.len()
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.active_job_count().await;
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "Waiting for running jobs to stop");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Whether the pipeline still accepts new jobs
    pub fn is_accepting(&self) -> bool {
        self.execution.accepting_new.load(Ordering::SeqCst)
    }

    /// Number of jobs in non-terminal states according to the store
    pub async fn unfinished_job_count(&self) -> Result<usize> {
        let mut count = 0;
        for status in [JobStatus::Pending, JobStatus::Processing] {
            count += self
                .store_call(|| self.store.list_jobs(Some(status)))
                .await?
                .len();
        }
        Ok(count)
    }
}
