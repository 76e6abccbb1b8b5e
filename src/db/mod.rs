//! Database layer for mailsieve
//!
//! SQLite persistence for jobs, their ingested address sequences, per-address
//! verdicts and runtime state. [`Database`] implements
//! [`JobRecordStore`](crate::store::JobRecordStore).
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`jobs`] - Job records, address sequences, status compare-and-set
//! - [`verdicts`] - Idempotent verdict upserts and count recomputation
//! - [`state`] - Runtime state (shutdown tracking)
//!
//! Timestamps are stored as Unix milliseconds so last-write-wins on verdicts
//! resolves sub-second deliveries.

use crate::types::{JobId, JobStatus, ReasonCode, ValidationJob, ValidationVerdict};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod jobs;
mod migrations;
mod state;
mod store;
mod verdicts;

/// Job record from database
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    /// Job identifier
    pub id: String,
    /// Status code (see [`JobStatus::to_i32`])
    pub status: i32,
    /// Distinct addresses ingested
    pub total_addresses: i64,
    /// Addresses with a verdict
    pub processed_count: i64,
    /// Valid verdicts
    pub valid_count: i64,
    /// Invalid verdicts
    pub invalid_count: i64,
    /// Opaque reference to the uploaded file
    pub source_location: String,
    /// Notification claimed (0 = no, 1 = yes)
    pub notified: bool,
    /// Abort or force-finalization reason
    pub failure_reason: Option<String>,
    /// Unix milliseconds when the job was ingested
    pub created_at: i64,
    /// Unix milliseconds of the last mutation
    pub updated_at: i64,
}

impl From<JobRow> for ValidationJob {
    fn from(row: JobRow) -> Self {
        ValidationJob {
            id: JobId(row.id),
            status: JobStatus::from_i32(row.status),
            total_addresses: row.total_addresses.max(0) as u64,
            processed_count: row.processed_count.max(0) as u64,
            valid_count: row.valid_count.max(0) as u64,
            invalid_count: row.invalid_count.max(0) as u64,
            source_location: row.source_location,
            created_at: from_millis(row.created_at),
            updated_at: from_millis(row.updated_at),
            notified: row.notified,
            failure_reason: row.failure_reason,
        }
    }
}

/// Verdict record from database
#[derive(Debug, Clone, FromRow)]
pub struct VerdictRow {
    /// Address as ingested
    pub address: String,
    /// Whether the address is deliverable
    pub is_valid: bool,
    /// Reason code (see [`ReasonCode::to_i32`])
    pub reason: i32,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Unix milliseconds when the verdict was produced
    pub checked_at: i64,
}

impl From<VerdictRow> for ValidationVerdict {
    fn from(row: VerdictRow) -> Self {
        ValidationVerdict::at(
            row.address,
            ReasonCode::from_i32(row.reason),
            row.confidence,
            from_millis(row.checked_at),
        )
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Database handle for mailsieve
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
