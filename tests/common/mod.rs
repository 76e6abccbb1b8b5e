//! Common test utilities for mailsieve end-to-end tests

#![allow(dead_code)]

use async_trait::async_trait;
use mailsieve::{
    Config, DomainResolver, Event, JobId, JobStatus, JobSummary, Notifier, ResolveError,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Resolver answering from a fixed set of existing domains
pub struct KnownDomains(pub HashSet<String>);

impl KnownDomains {
    pub fn new(domains: &[&str]) -> Self {
        Self(domains.iter().map(|d| d.to_string()).collect())
    }
}

#[async_trait]
impl DomainResolver for KnownDomains {
    async fn domain_exists(&self, domain: &str) -> Result<bool, ResolveError> {
        Ok(self.0.contains(domain))
    }
}

/// Notifier that records every delivery
#[derive(Default)]
pub struct RecordingNotifier {
    pub deliveries: Mutex<Vec<(JobId, JobStatus, JobSummary)>>,
}

impl RecordingNotifier {
    pub fn count_for(&self, id: &JobId) -> usize {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|(job, _, _)| job == id)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        job_id: &JobId,
        status: JobStatus,
        summary: &JobSummary,
        _failure_reason: Option<&str>,
    ) -> mailsieve::Result<()> {
        self.deliveries
            .lock()
            .unwrap()
            .push((job_id.clone(), status, *summary));
        Ok(())
    }
}

/// Config pointing at a mock oracle, with fast retries
pub fn test_config(oracle_uri: &str, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.oracle.endpoint = oracle_uri.to_string();
    config.oracle.identity = "mail.example.com".to_string();
    config.oracle.rate_limit_per_second = None;
    config.oracle.retry.initial_delay = Duration::from_millis(5);
    config.oracle.retry.jitter = false;
    config.resolver.retry.initial_delay = Duration::from_millis(5);
    config.pipeline.store_retry.initial_delay = Duration::from_millis(5);
    config.pipeline.batch_size = 4;
    config.persistence.database_path = db_path.to_path_buf();
    config
}

/// Mount an oracle answer for one address
pub async fn oracle_answers(server: &MockServer, address: &str, result: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/mailbox-checks"))
        .and(body_partial_json(serde_json::json!({ "address": address })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "result": result, "confidence": 0.9 })),
        )
        .mount(server)
        .await;
}

/// Result of waiting for a job to finish
#[derive(Debug)]
pub enum WaitResult {
    /// Job reached a terminal state
    Finished(JobStatus, JobSummary),
    /// Timeout waiting for the job
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for a `JobFinished` event for `id` on an already-subscribed receiver
pub async fn wait_for_finished(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: &JobId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::JobFinished {
                    id: event_id,
                    status,
                    summary,
                }) if &event_id == id => return WaitResult::Finished(status, summary),
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}
