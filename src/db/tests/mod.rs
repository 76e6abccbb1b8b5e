mod jobs;

use crate::db::Database;
use crate::types::{JobId, JobStatus, ValidationJob};
use chrono::Utc;

/// A fresh Pending job record with `n` addresses
pub(super) fn new_job(id: &str, addresses: &[&str]) -> (ValidationJob, Vec<String>) {
    let now = Utc::now();
    let job = ValidationJob {
        id: JobId::new(id),
        status: JobStatus::Pending,
        total_addresses: addresses.len() as u64,
        processed_count: 0,
        valid_count: 0,
        invalid_count: 0,
        source_location: format!("uploads/{id}.csv"),
        created_at: now,
        updated_at: now,
        notified: false,
        failure_reason: None,
    };
    (job, addresses.iter().map(|a| a.to_string()).collect())
}

/// Insert a job and return its ID
pub(super) async fn seed_job(db: &Database, id: &str, addresses: &[&str]) -> JobId {
    let (job, addresses) = new_job(id, addresses);
    db.insert_job(&job, &addresses).await.unwrap();
    job.id
}
