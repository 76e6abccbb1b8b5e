//! Shared test helpers: scripted collaborators and pipeline construction.

use crate::config::{Config, RetryConfig};
use crate::db::Database;
use crate::error::{DatabaseError, Error, OracleError, ResolveError, Result};
use crate::pipeline::{Notifier, PipelineComponents, ValidationPipeline};
use crate::store::JobRecordStore;
use crate::types::{JobId, JobStatus, JobSummary, ReasonCount, ValidationJob, ValidationVerdict};
use crate::validator::{DeliverabilityOracle, DomainResolver, MailboxCheck, MailboxOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Default config with millisecond retry delays and no rate limit
///
/// Attempt budgets keep their defaults (oracle 3, resolver 2, store 3).
pub(crate) fn fast_config() -> Config {
    let mut config = Config::default();
    config.oracle.rate_limit_per_second = None;
    config.oracle.timeout = Duration::from_secs(1);
    config.oracle.retry = fast_retry(config.oracle.retry.max_attempts);
    config.resolver.timeout = Duration::from_secs(1);
    config.resolver.retry = fast_retry(config.resolver.retry.max_attempts);
    config.pipeline.store_timeout = Duration::from_secs(2);
    config.pipeline.store_retry = fast_retry(config.pipeline.store_retry.max_attempts);
    config
}

/// Oracle answering from a script
pub(crate) struct ScriptedOracle {
    default: std::result::Result<MailboxCheck, OracleError>,
    answers: HashMap<String, std::result::Result<MailboxCheck, OracleError>>,
    fail_first: u64,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl ScriptedOracle {
    /// Accept every mailbox without reporting a confidence
    pub(crate) fn accepting() -> Self {
        Self::always(Ok(MailboxCheck {
            result: MailboxOutcome::Accepted,
            confidence: None,
        }))
    }

    /// Give the same answer for every address
    pub(crate) fn always(answer: std::result::Result<MailboxCheck, OracleError>) -> Self {
        Self {
            default: answer,
            answers: HashMap::new(),
            fail_first: 0,
            delay: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Override the answer for one address
    pub(crate) fn with_answer(
        mut self,
        address: &str,
        answer: std::result::Result<MailboxCheck, OracleError>,
    ) -> Self {
        self.answers.insert(address.to_string(), answer);
        self
    }

    /// Report `Unavailable` for the first `n` calls
    pub(crate) fn failing_first(mut self, n: u64) -> Self {
        self.fail_first = n;
        self
    }

    /// Sleep before every answer
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far
    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliverabilityOracle for ScriptedOracle {
    async fn check_mailbox(
        &self,
        _identity: &str,
        address: &str,
    ) -> std::result::Result<MailboxCheck, OracleError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call < self.fail_first {
            return Err(OracleError::Unavailable("scripted outage".into()));
        }
        self.answers
            .get(address)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Resolver where every domain exists unless listed otherwise
#[derive(Default)]
pub(crate) struct StaticResolver {
    missing: HashSet<String>,
    broken: HashSet<String>,
    lookups: AtomicU64,
}

impl StaticResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Domain that definitively does not exist
    pub(crate) fn missing(mut self, domain: &str) -> Self {
        self.missing.insert(domain.to_string());
        self
    }

    /// Domain whose lookups always fail
    pub(crate) fn broken(mut self, domain: &str) -> Self {
        self.broken.insert(domain.to_string());
        self
    }

    pub(crate) fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainResolver for StaticResolver {
    async fn domain_exists(&self, domain: &str) -> std::result::Result<bool, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(domain) {
            return Err(ResolveError::Failed("SERVFAIL".into()));
        }
        Ok(!self.missing.contains(domain))
    }
}

/// One recorded notification
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Notification {
    pub(crate) job_id: JobId,
    pub(crate) status: JobStatus,
    pub(crate) summary: JobSummary,
    pub(crate) failure_reason: Option<String>,
}

/// Notifier that records every call
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record calls but report a transport failure for each
    pub(crate) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn count_for(&self, job_id: &JobId) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| &n.job_id == job_id)
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
        failure_reason: Option<&str>,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Notification {
            job_id: job_id.clone(),
            status,
            summary: *summary,
            failure_reason: failure_reason.map(str::to_string),
        });
        if self.fail {
            return Err(Error::Other("scripted transport failure".into()));
        }
        Ok(())
    }
}

/// SQLite store whose verdict writes can be made to fail
pub(crate) struct FlakyStore {
    inner: Arc<Database>,
    failing_verdicts: AtomicU64,
    verdict_attempts: AtomicU64,
}

impl FlakyStore {
    pub(crate) fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            failing_verdicts: AtomicU64::new(0),
            verdict_attempts: AtomicU64::new(0),
        }
    }

    /// Fail the next `n` verdict writes (`u64::MAX` for a permanent outage)
    pub(crate) fn fail_verdicts(&self, n: u64) {
        self.failing_verdicts.store(n, Ordering::SeqCst);
    }

    pub(crate) fn verdict_attempts(&self) -> u64 {
        self.verdict_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRecordStore for FlakyStore {
    async fn insert_job(&self, job: &ValidationJob, addresses: &[String]) -> Result<()> {
        self.inner.insert_job(job, addresses).await
    }

    async fn upsert_job(&self, job: &ValidationJob) -> Result<()> {
        self.inner.upsert_job(job).await
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<ValidationJob>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<ValidationJob>> {
        self.inner.list_jobs(status).await
    }

    async fn upsert_verdict(&self, id: &JobId, verdict: &ValidationVerdict) -> Result<bool> {
        self.verdict_attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_verdicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DatabaseError::ConnectionFailed("scripted outage".into()).into());
        }
        self.inner.upsert_verdict(id, verdict).await
    }

    async fn list_verdicts(&self, id: &JobId) -> Result<Vec<ValidationVerdict>> {
        self.inner.list_verdicts(id).await
    }

    async fn pending_addresses(&self, id: &JobId) -> Result<Vec<String>> {
        self.inner.pending_addresses(id).await
    }

    async fn recompute_counts(&self, id: &JobId) -> Result<ValidationJob> {
        self.inner.recompute_counts(id).await
    }

    async fn transition_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        to: JobStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        self.inner.transition_status(id, expected, to, reason).await
    }

    async fn claim_notification(&self, id: &JobId) -> Result<bool> {
        self.inner.claim_notification(id).await
    }

    async fn release_notification(&self, id: &JobId) -> Result<()> {
        self.inner.release_notification(id).await
    }

    async fn reason_counts(&self, id: &JobId) -> Result<Vec<ReasonCount>> {
        self.inner.reason_counts(id).await
    }
}

/// Open a fresh SQLite database inside `dir`
pub(crate) async fn open_test_db(dir: &TempDir) -> Arc<Database> {
    Arc::new(Database::new(&dir.path().join("test.db")).await.unwrap())
}

/// Build a pipeline over the given collaborators (restores unfinished jobs)
pub(crate) async fn pipeline_over(
    config: Config,
    store: Arc<dyn JobRecordStore>,
    oracle: Arc<dyn DeliverabilityOracle>,
    notifier: Arc<RecordingNotifier>,
) -> ValidationPipeline {
    ValidationPipeline::with_components(
        config,
        PipelineComponents {
            store,
            resolver: Arc::new(StaticResolver::new().missing("nowhere.test")),
            oracle,
            notifier,
        },
    )
    .await
    .unwrap()
}

/// Pipeline on a throwaway SQLite database with a recording notifier.
/// Returns the pipeline, the tempdir (which must be kept alive) and the notifier.
pub(crate) async fn create_test_pipeline(
    config: Config,
    oracle: ScriptedOracle,
) -> (ValidationPipeline, TempDir, Arc<RecordingNotifier>) {
    let temp_dir = tempdir().unwrap();
    let db = open_test_db(&temp_dir).await;
    let notifier = Arc::new(RecordingNotifier::new());
    let pipeline = pipeline_over(config, db, Arc::new(oracle), notifier.clone()).await;
    (pipeline, temp_dir, notifier)
}

/// Poll until the job is terminal and every job task has stopped
pub(crate) async fn wait_for_terminal(pipeline: &ValidationPipeline, id: &JobId) -> ValidationJob {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let job = pipeline.get_job(id).await.unwrap().unwrap();
            if job.status.is_terminal() && pipeline.active_job_count().await == 0 {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach a terminal state in time")
}

/// Poll until no job task is running
pub(crate) async fn wait_until_idle(pipeline: &ValidationPipeline) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while pipeline.active_job_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job tasks did not stop in time");
}
