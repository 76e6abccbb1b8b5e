//! Job lifecycle rules
//!
//! ```text
//! Pending ──first dispatch──▶ Processing ──terminal decision──▶ Completed
//!    │                            │                            PartiallyCompleted
//!    └──────────abort─────────────┴───────────abort──────────▶ Failed
//! ```
//!
//! Terminal states are absorbing. This module holds no state, the store's
//! compare-and-set update is what makes a legal transition stick.

use crate::error::JobError;
use crate::types::{JobId, JobStatus};

/// What is asking for a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionTrigger {
    /// The first validation unit of the job was dispatched
    FirstDispatch,
    /// The aggregator saw every address resolved
    TerminalDecision,
    /// Ingestion failure, infrastructure failure, deadline or administrative abort
    Abort,
}

/// Check a transition and return the target status if it is legal
pub fn transition(
    id: &JobId,
    from: JobStatus,
    to: JobStatus,
    trigger: TransitionTrigger,
) -> Result<JobStatus, JobError> {
    use JobStatus::*;
    use TransitionTrigger::*;

    let legal = match (from, to, trigger) {
        (Pending, Processing, FirstDispatch) => true,
        (Processing, Completed | Failed | PartiallyCompleted, TerminalDecision) => true,
        (Pending | Processing, Failed, Abort) => true,
        _ => false,
    };

    if legal {
        Ok(to)
    } else {
        Err(JobError::IllegalTransition {
            id: id.clone(),
            from,
            to,
        })
    }
}

/// Terminal status once every address has a verdict
///
/// An empty job has nothing invalid and completes.
pub fn terminal_decision(total: u64, valid: u64, invalid: u64) -> JobStatus {
    if invalid == 0 {
        JobStatus::Completed
    } else if valid == 0 && total > 0 {
        JobStatus::Failed
    } else {
        JobStatus::PartiallyCompleted
    }
}
