//! Execution of a single address validation unit.

use crate::types::AddressValidationUnit;
use tokio_util::sync::CancellationToken;

use super::ValidationPipeline;

impl ValidationPipeline {
    /// Validate one address and hand the verdict to the aggregator
    ///
    /// The unit checks for cancellation (abort, deadline, shutdown) before
    /// starting and again right before the oracle call. A cancelled unit records
    /// nothing, so its address stays pending and shows up as unprocessed.
    pub(crate) async fn run_unit(&self, unit: AddressValidationUnit, cancel_token: CancellationToken) {
        let AddressValidationUnit {
            job_id,
            address,
            attempt,
        } = unit;

        if cancel_token.is_cancelled() {
            return;
        }

        let verdict = match self.validator.precheck(&address).await {
            Some(verdict) => verdict,
            None => {
                if cancel_token.is_cancelled() {
                    tracing::debug!(job_id = %job_id, %address, "Unit cancelled before oracle call");
                    return;
                }
                match self.store_call(|| self.store.get_job(&job_id)).await {
                    Ok(Some(job)) if job.status.is_terminal() => {
                        tracing::debug!(
                            job_id = %job_id,
                            %address,
                            status = %job.status,
                            "Job no longer running, skipping oracle call"
                        );
                        return;
                    }
                    Ok(None) => {
                        tracing::warn!(job_id = %job_id, %address, "Job not found, skipping oracle call");
                        return;
                    }
                    Ok(Some(_)) => {}
                    Err(e) => {
                        tracing::error!(job_id = %job_id, %address, error = %e, "Store unavailable before oracle call");
                        cancel_token.cancel();
                        self.fail_on_persistence_error(&job_id, &e).await;
                        return;
                    }
                }
                self.validator.check_mailbox(&address).await
            }
        };

        tracing::trace!(job_id = %job_id, %address, attempt, reason = ?verdict.reason, "Unit finished");

        if let Err(e) = self.on_verdict(&job_id, verdict).await {
            tracing::error!(job_id = %job_id, %address, error = %e, "Failed to record verdict");
            if !matches!(e, crate::Error::Job(_)) {
                cancel_token.cancel();
            }
            self.fail_on_persistence_error(&job_id, &e).await;
        }
    }
}
