//! Job submission.

use crate::error::{Error, Result};
use crate::types::{Event, IngestedFile, JobId, JobStatus, ValidationJob};
use std::collections::HashSet;
use std::sync::atomic::Ordering;

use super::ValidationPipeline;

/// Trim addresses and drop exact repeats, keeping first occurrences in order
///
/// Verdicts are keyed by `(job, address)`, so a repeated address can only ever
/// count once.
pub fn normalize_addresses(addresses: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .iter()
        .map(|a| a.trim())
        .filter(|a| seen.insert(*a))
        .map(str::to_string)
        .collect()
}

impl ValidationPipeline {
    /// Accept an ingested file, persist it as a Pending job and start validating
    ///
    /// If the declared address count does not match the supplied sequence the job
    /// is still recorded, then failed immediately, and
    /// [`Error::InvalidIngestion`] is returned.
    pub async fn submit_job(&self, file: IngestedFile) -> Result<JobId> {
        if !self.execution.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let addresses = normalize_addresses(&file.addresses);
        let supplied = file.addresses.len() as u64;
        let now = chrono::Utc::now();

        let job = ValidationJob {
            id: file.job_id,
            status: JobStatus::Pending,
            total_addresses: addresses.len() as u64,
            processed_count: 0,
            valid_count: 0,
            invalid_count: 0,
            source_location: file.source_location,
            created_at: now,
            updated_at: now,
            notified: false,
            failure_reason: None,
        };

        self.store_call(|| self.store.insert_job(&job, &addresses))
            .await?;

        let id = job.id;
        tracing::info!(
            job_id = %id,
            total_addresses = addresses.len(),
            duplicates = supplied - addresses.len() as u64,
            "Job ingested"
        );
        self.emit_event(Event::JobQueued {
            id: id.clone(),
            total_addresses: addresses.len() as u64,
        });

        if file.total_addresses != supplied {
            let reason = format!(
                "declared {} addresses but received {}",
                file.total_addresses, supplied
            );
            tracing::warn!(job_id = %id, %reason, "Ingestion count mismatch");
            self.fail_job(&id, &reason).await?;
            return Err(Error::InvalidIngestion(format!("job {}: {}", id, reason)));
        }

        let plan = self.enqueue(&id, &addresses);
        self.dispatch(plan).await;

        Ok(id)
    }
}
