//! Verdict upserts and count recomputation.

use crate::error::{DatabaseError, JobError};
use crate::types::{JobId, JobStatus, ReasonCode, ReasonCount, ValidationJob, ValidationVerdict};
use crate::{Error, Result};

use super::{Database, VerdictRow, now_millis};

impl Database {
    /// Record a verdict for `(job, address)`
    ///
    /// Re-delivery of the same key replaces the stored verdict only if it is not
    /// older (last-write-wins on `checked_at`) and the job is still running.
    /// Once a job is terminal its existing verdicts are frozen; only addresses
    /// that never got one (units in flight during an abort) can still be
    /// filled in. Returns whether the row was written.
    pub async fn upsert_verdict(&self, id: &JobId, verdict: &ValidationVerdict) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO verdicts (job_id, address, is_valid, reason, confidence, checked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id, address) DO UPDATE SET
                is_valid = excluded.is_valid,
                reason = excluded.reason,
                confidence = excluded.confidence,
                checked_at = excluded.checked_at
            WHERE excluded.checked_at >= verdicts.checked_at
              AND EXISTS (
                  SELECT 1 FROM jobs
                  WHERE jobs.id = excluded.job_id AND jobs.status IN (?, ?)
              )
            "#,
        )
        .bind(id)
        .bind(&verdict.address)
        .bind(verdict.is_valid)
        .bind(verdict.reason.to_i32())
        .bind(verdict.confidence)
        .bind(verdict.checked_at.timestamp_millis())
        .bind(JobStatus::Pending.to_i32())
        .bind(JobStatus::Processing.to_i32())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                // Distinguish a missing job from an address outside its sequence
                if self.get_job(id).await?.is_none() {
                    Err(Error::Job(JobError::NotFound { id: id.clone() }))
                } else {
                    Err(Error::Job(JobError::UnknownAddress {
                        id: id.clone(),
                        address: verdict.address.clone(),
                    }))
                }
            }
            Err(e) => Err(Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert verdict: {}",
                e
            )))),
        }
    }

    /// All verdicts of a job, in ingestion order
    pub async fn list_verdicts(&self, id: &JobId) -> Result<Vec<ValidationVerdict>> {
        let rows = sqlx::query_as::<_, VerdictRow>(
            r#"
            SELECT v.address, v.is_valid, v.reason, v.confidence, v.checked_at
            FROM verdicts v
            JOIN job_addresses a ON a.job_id = v.job_id AND a.address = v.address
            WHERE v.job_id = ?
            ORDER BY a.position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list verdicts: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(ValidationVerdict::from).collect())
    }

    /// Recompute a job's counts from its distinct persisted verdicts
    ///
    /// Counts are always derived, never incremented, so duplicate or reordered
    /// deliveries cannot skew them. Counts of a `Completed` or
    /// `PartiallyCompleted` job are final and left untouched; a `Failed` job
    /// still picks up verdicts of units that were in flight when it was
    /// aborted. Returns the refreshed job.
    pub async fn recompute_counts(&self, id: &JobId) -> Result<ValidationJob> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                processed_count = (SELECT COUNT(*) FROM verdicts WHERE job_id = ?),
                valid_count = (SELECT COUNT(*) FROM verdicts WHERE job_id = ? AND is_valid = 1),
                invalid_count = (SELECT COUNT(*) FROM verdicts WHERE job_id = ? AND is_valid = 0),
                updated_at = MAX(updated_at, ?)
            WHERE id = ? AND status NOT IN (?, ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .bind(id)
        .bind(now_millis())
        .bind(id)
        .bind(JobStatus::Completed.to_i32())
        .bind(JobStatus::PartiallyCompleted.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to recompute job counts: {}",
                e
            )))
        })?;

        self.get_job(id)
            .await?
            .ok_or_else(|| Error::Job(JobError::NotFound { id: id.clone() }))
    }

    /// Verdict counts per reason code, including zero counts
    pub async fn reason_counts(&self, id: &JobId) -> Result<Vec<ReasonCount>> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            "SELECT reason, COUNT(*) FROM verdicts WHERE job_id = ? GROUP BY reason",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count verdict reasons: {}",
                e
            )))
        })?;

        Ok(ReasonCode::ALL
            .iter()
            .map(|&reason| ReasonCount {
                reason,
                count: rows
                    .iter()
                    .filter(|(code, _)| ReasonCode::from_i32(*code) == reason)
                    .map(|(_, n)| (*n).max(0) as u64)
                    .sum(),
            })
            .collect())
    }
}
