mod control;

use super::ValidationPipeline;
use super::test_helpers::{
    FlakyStore, RecordingNotifier, ScriptedOracle, create_test_pipeline, fast_config,
    open_test_db, pipeline_over, wait_for_terminal, wait_until_idle,
};
use crate::error::{Error, JobError, OracleError};
use crate::types::{Event, IngestedFile, JobId, JobStatus, ReasonCode, ValidationVerdict};
use std::sync::Arc;
use std::time::Duration;

/// An ingested file whose declared count matches its addresses
fn file(id: &str, addresses: &[&str]) -> IngestedFile {
    IngestedFile {
        job_id: JobId::new(id),
        source_location: format!("uploads/{id}.csv"),
        total_addresses: addresses.len() as u64,
        addresses: addresses.iter().map(|a| a.to_string()).collect(),
    }
}

fn numbered(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user{i}@example.com")).collect()
}

fn file_of(id: &str, addresses: &[String]) -> IngestedFile {
    let refs: Vec<&str> = addresses.iter().map(String::as_str).collect();
    file(id, &refs)
}
