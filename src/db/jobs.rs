//! Job records, address sequences and status compare-and-set.

use crate::error::{DatabaseError, JobError};
use crate::types::{JobId, JobStatus, ValidationJob};
use crate::{Error, Result};

use super::{Database, JobRow, now_millis};

const JOB_COLUMNS: &str = r#"
    id, status, total_addresses, processed_count, valid_count, invalid_count,
    source_location, notified, failure_reason, created_at, updated_at
"#;

impl Database {
    /// Insert a new job together with its address sequence
    ///
    /// Both are written in one transaction. Fails with
    /// [`JobError::AlreadyExists`] if the ID is taken.
    pub async fn insert_job(&self, job: &ValidationJob, addresses: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (
                id, status, total_addresses, processed_count, valid_count, invalid_count,
                source_location, notified, failure_reason, created_at, updated_at
            ) VALUES (?, ?, ?, 0, 0, 0, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.status.to_i32())
        .bind(job.total_addresses as i64)
        .bind(&job.source_location)
        .bind(&job.failure_reason)
        .bind(job.created_at.timestamp_millis())
        .bind(job.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return Err(match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Error::Job(JobError::AlreadyExists { id: job.id.clone() })
                }
                _ => Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert job: {}",
                    e
                ))),
            });
        }

        for (position, address) in addresses.iter().enumerate() {
            sqlx::query("INSERT INTO job_addresses (job_id, position, address) VALUES (?, ?, ?)")
                .bind(&job.id)
                .bind(position as i64)
                .bind(address)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to insert job address: {}",
                        e
                    )))
                })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit job insert: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Insert a job record or refresh its descriptive fields
    ///
    /// Status, counts and the notification flag are never overwritten here; they
    /// only move through [`transition_status`](Self::transition_status),
    /// [`recompute_counts`](Self::recompute_counts) and
    /// [`claim_notification`](Self::claim_notification).
    pub async fn upsert_job(&self, job: &ValidationJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, status, total_addresses, processed_count, valid_count, invalid_count,
                source_location, notified, failure_reason, created_at, updated_at
            ) VALUES (?, ?, ?, 0, 0, 0, ?, 0, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_location = excluded.source_location,
                failure_reason = COALESCE(excluded.failure_reason, jobs.failure_reason),
                updated_at = MAX(jobs.updated_at, excluded.updated_at)
            "#,
        )
        .bind(&job.id)
        .bind(job.status.to_i32())
        .bind(job.total_addresses as i64)
        .bind(&job.source_location)
        .bind(&job.failure_reason)
        .bind(job.created_at.timestamp_millis())
        .bind(job.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert job: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: &JobId) -> Result<Option<ValidationJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get job: {}",
                e
            )))
        })?;

        Ok(row.map(ValidationJob::from))
    }

    /// List jobs, oldest first, optionally restricted to one status
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<ValidationJob>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {} FROM jobs WHERE status = ? ORDER BY created_at, id",
                    JOB_COLUMNS
                ))
                .bind(status.to_i32())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {} FROM jobs ORDER BY created_at, id",
                    JOB_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list jobs: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(ValidationJob::from).collect())
    }

    /// Addresses of the job that have no verdict yet, in ingestion order
    pub async fn pending_addresses(&self, id: &JobId) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT a.address
            FROM job_addresses a
            LEFT JOIN verdicts v ON v.job_id = a.job_id AND v.address = a.address
            WHERE a.job_id = ? AND v.address IS NULL
            ORDER BY a.position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list pending addresses: {}",
                e
            )))
        })
    }

    /// Move a job from `expected` to `to` if it is still in `expected`
    ///
    /// The caller is responsible for the legality of the transition. When the
    /// stored status differs, returns [`JobError::StatusConflict`] with the
    /// actual status so the caller can re-evaluate.
    pub async fn transition_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        to: JobStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?,
                failure_reason = COALESCE(?, failure_reason),
                updated_at = MAX(updated_at, ?)
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.to_i32())
        .bind(reason)
        .bind(now_millis())
        .bind(id)
        .bind(expected.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update job status: {}",
                e
            )))
        })?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.get_job(id).await? {
            None => Err(Error::Job(JobError::NotFound { id: id.clone() })),
            Some(job) => Err(Error::Job(JobError::StatusConflict {
                id: id.clone(),
                expected,
                actual: job.status,
            })),
        }
    }

    /// Claim the right to send the job's terminal notification
    ///
    /// Returns true for exactly one caller per job, and only once the job is
    /// terminal.
    pub async fn claim_notification(&self, id: &JobId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET notified = 1, updated_at = MAX(updated_at, ?)
            WHERE id = ? AND notified = 0 AND status IN (?, ?, ?)
            "#,
        )
        .bind(now_millis())
        .bind(id)
        .bind(JobStatus::Completed.to_i32())
        .bind(JobStatus::Failed.to_i32())
        .bind(JobStatus::PartiallyCompleted.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim notification: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() == 1)
    }

    /// Clear the notification claim so the next restore retries delivery
    pub async fn release_notification(&self, id: &JobId) -> Result<()> {
        sqlx::query("UPDATE jobs SET notified = 0, updated_at = MAX(updated_at, ?) WHERE id = ?")
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to release notification claim: {}",
                    e
                )))
            })?;
        Ok(())
    }
}
