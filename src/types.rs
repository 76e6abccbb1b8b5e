//! Core types for mailsieve

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opaque identifier for a validation job
///
/// Assigned at ingestion and never changed afterwards. The pipeline does not
/// interpret the contents, it only compares and stores them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a JobId from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier (`job-` followed by 16 hex digits)
    pub fn generate() -> Self {
        use rand::Rng;
        let value: u64 = rand::thread_rng().r#gen();
        Self(format!("job-{:016x}", value))
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Job lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Ingested, no unit dispatched yet
    Pending,
    /// At least one validation unit has been dispatched
    Processing,
    /// Every address validated and every verdict is valid
    Completed,
    /// No valid address, or the job was aborted
    Failed,
    /// Every address validated with a mix of valid and invalid verdicts
    PartiallyCompleted,
}

impl JobStatus {
    /// Convert integer status code to JobStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => JobStatus::Pending,
            1 => JobStatus::Processing,
            2 => JobStatus::Completed,
            3 => JobStatus::Failed,
            4 => JobStatus::PartiallyCompleted,
            _ => JobStatus::Failed, // Unknown codes are treated as failed
        }
    }

    /// Convert JobStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed => 2,
            JobStatus::Failed => 3,
            JobStatus::PartiallyCompleted => 4,
        }
    }

    /// Terminal states are absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::PartiallyCompleted
        )
    }

    /// Lowercase name used in logs, webhooks and error details
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::PartiallyCompleted => "partially_completed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an address received its verdict
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Address failed the grammar check
    SyntaxInvalid,
    /// Domain has no mail-capable DNS records
    DomainNotFound,
    /// Oracle definitively rejected the mailbox
    MailboxRejected,
    /// Oracle (or resolver) could not give an answer within the retry budget
    OracleUnavailable,
    /// Oracle accepted the mailbox
    Valid,
}

impl ReasonCode {
    /// All reason codes, in reporting order
    pub const ALL: [ReasonCode; 5] = [
        ReasonCode::Valid,
        ReasonCode::SyntaxInvalid,
        ReasonCode::DomainNotFound,
        ReasonCode::MailboxRejected,
        ReasonCode::OracleUnavailable,
    ];

    /// Convert integer reason code to ReasonCode
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => ReasonCode::Valid,
            1 => ReasonCode::SyntaxInvalid,
            2 => ReasonCode::DomainNotFound,
            3 => ReasonCode::MailboxRejected,
            _ => ReasonCode::OracleUnavailable,
        }
    }

    /// Convert ReasonCode to integer code
    pub fn to_i32(&self) -> i32 {
        match self {
            ReasonCode::Valid => 0,
            ReasonCode::SyntaxInvalid => 1,
            ReasonCode::DomainNotFound => 2,
            ReasonCode::MailboxRejected => 3,
            ReasonCode::OracleUnavailable => 4,
        }
    }
}

/// A validation job as stored by the job store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationJob {
    /// Job identifier
    #[schema(value_type = String)]
    pub id: JobId,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Number of distinct addresses ingested for this job
    pub total_addresses: u64,
    /// Number of addresses with a recorded verdict
    pub processed_count: u64,
    /// Number of recorded verdicts that are valid
    pub valid_count: u64,
    /// Number of recorded verdicts that are invalid
    pub invalid_count: u64,
    /// Opaque reference to the uploaded source file
    pub source_location: String,
    /// When the job was ingested
    pub created_at: DateTime<Utc>,
    /// Last mutation time (never decreases)
    pub updated_at: DateTime<Utc>,
    /// Whether the terminal notification has been claimed
    pub notified: bool,
    /// Why the job was aborted or force-finalized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ValidationJob {
    /// Counts snapshot for reports and notifications
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            total_addresses: self.total_addresses,
            processed_count: self.processed_count,
            valid_count: self.valid_count,
            invalid_count: self.invalid_count,
        }
    }

    /// True when every address has a verdict
    pub fn is_fully_processed(&self) -> bool {
        self.processed_count == self.total_addresses
    }
}

/// Terminal outcome for one address within one job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationVerdict {
    /// The address as ingested
    pub address: String,
    /// True only when `reason` is [`ReasonCode::Valid`]
    pub is_valid: bool,
    /// Which check produced the verdict
    pub reason: ReasonCode,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// When the verdict was produced (last-write-wins key)
    pub checked_at: DateTime<Utc>,
}

impl ValidationVerdict {
    /// Build a verdict stamped with the current time
    pub fn new(address: impl Into<String>, reason: ReasonCode, confidence: f64) -> Self {
        Self::at(address, reason, confidence, Utc::now())
    }

    /// Build a verdict with an explicit timestamp
    pub fn at(
        address: impl Into<String>,
        reason: ReasonCode,
        confidence: f64,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            address: address.into(),
            is_valid: reason == ReasonCode::Valid,
            reason,
            confidence,
            checked_at,
        }
    }
}

/// One address scheduled for validation
///
/// Carries a one-way back-reference to its job. Moved into the task that
/// validates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressValidationUnit {
    /// Job this address belongs to
    pub job_id: JobId,
    /// Raw address string
    pub address: String,
    /// Dispatch attempt (0 on first dispatch, incremented on resume)
    pub attempt: u32,
}

/// Work derived from a job's address sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    /// Job the plan belongs to
    pub job_id: JobId,
    /// Fixed-size batches of units (the last batch may be shorter)
    pub batches: Vec<Vec<AddressValidationUnit>>,
}

impl BatchPlan {
    /// Total number of units across all batches
    pub fn unit_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// True when nothing remains to dispatch
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Count snapshot passed to the notification transport
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobSummary {
    /// Distinct addresses in the job
    pub total_addresses: u64,
    /// Addresses with a verdict
    pub processed_count: u64,
    /// Valid verdicts
    pub valid_count: u64,
    /// Invalid verdicts
    pub invalid_count: u64,
}

/// Input handed over by the storage-ingestion collaborator once a file is received
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestedFile {
    /// Identifier assigned at ingestion
    #[schema(value_type = String)]
    pub job_id: JobId,
    /// Opaque reference to the stored upload
    pub source_location: String,
    /// Number of addresses the ingestion layer counted
    pub total_addresses: u64,
    /// The decoded address sequence
    pub addresses: Vec<String>,
}

/// Number of verdicts with a given reason
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReasonCount {
    /// Reason code
    pub reason: ReasonCode,
    /// Verdicts with that reason
    pub count: u64,
}

/// Final (or in-progress) report for a job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobReport {
    /// The job record
    pub job: ValidationJob,
    /// Verdict counts per reason code
    pub reasons: Vec<ReasonCount>,
    /// Addresses without any verdict (non-zero only for unfinished or aborted jobs)
    pub unprocessed_count: u64,
}

/// Payload sent to webhook endpoints when a job reaches a terminal state
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    /// Event name ("completed", "partially_completed", "failed")
    pub event: String,
    /// Job identifier
    #[schema(value_type = String)]
    pub job_id: JobId,
    /// Final status
    pub status: JobStatus,
    /// Final counts
    pub summary: JobSummary,
    /// Abort or force-finalization reason, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Unix timestamp of the notification
    pub timestamp: i64,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted and persisted
    JobQueued {
        /// Job ID
        #[schema(value_type = String)]
        id: JobId,
        /// Distinct addresses in the job
        total_addresses: u64,
    },

    /// First unit dispatched (Pending → Processing)
    JobStarted {
        /// Job ID
        #[schema(value_type = String)]
        id: JobId,
    },

    /// A verdict was recorded and counts recomputed
    Progress {
        /// Job ID
        #[schema(value_type = String)]
        id: JobId,
        /// Addresses with a verdict
        processed: u64,
        /// Distinct addresses in the job
        total: u64,
    },

    /// Job reached a terminal state
    JobFinished {
        /// Job ID
        #[schema(value_type = String)]
        id: JobId,
        /// Final status
        status: JobStatus,
        /// Final counts
        summary: JobSummary,
    },

    /// Notification transport failed (the job outcome is unaffected)
    NotificationFailed {
        /// Job ID
        #[schema(value_type = String)]
        id: JobId,
        /// Error message
        error: String,
    },

    /// Pipeline is shutting down
    Shutdown,
}

impl Event {
    /// Short event name used for SSE event types
    pub fn name(&self) -> &'static str {
        match self {
            Event::JobQueued { .. } => "job_queued",
            Event::JobStarted { .. } => "job_started",
            Event::Progress { .. } => "progress",
            Event::JobFinished { .. } => "job_finished",
            Event::NotificationFailed { .. } => "notification_failed",
            Event::Shutdown => "shutdown",
        }
    }
}
