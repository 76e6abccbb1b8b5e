//! Validation job pipeline split into focused submodules.
//!
//! The `ValidationPipeline` struct and its methods are organized by domain:
//! - [`ingest`] - Job submission and address normalization
//! - [`fan_out`] - Batch planning, resume planning and dispatch
//! - [`unit`] - Execution of a single address validation unit
//! - [`aggregator`] - Verdict recording, count recomputation and terminal decision
//! - [`control`] - Administrative abort and forced failure
//! - [`lifecycle`] - Startup recovery and shutdown coordination
//! - [`report`] - Read-side queries and job reports
//! - [`notify`] - Terminal-state notification transports

mod aggregator;
mod control;
mod fan_out;
mod ingest;
mod lifecycle;
pub mod notify;
mod report;
mod unit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use fan_out::plan_batches;
pub use ingest::normalize_addresses;
pub use notify::{Notifier, WebhookNotifier};

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::store::JobRecordStore;
use crate::types::{Event, JobId};
use crate::validator::{AddressValidator, DeliverabilityOracle, DnsResolver, DomainResolver, HttpOracle};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;

/// Execution bookkeeping shared by all job tasks
#[derive(Clone)]
pub(crate) struct ExecutionState {
    /// Process-wide bound on concurrently running validation units
    pub(crate) unit_limit: Arc<tokio::sync::Semaphore>,
    /// Jobs with a running task, mapped to the token that stops their dispatch
    pub(crate) active_jobs: Arc<tokio::sync::Mutex<HashMap<JobId, CancellationToken>>>,
    /// Whether new jobs are accepted (cleared during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Collaborators the pipeline runs against
///
/// [`ValidationPipeline::new`] builds the production set (SQLite store, DNS
/// resolver, HTTP oracle, webhooks). Embedders and tests can supply their own.
pub struct PipelineComponents {
    /// Durable job store
    pub store: Arc<dyn JobRecordStore>,
    /// Domain existence checks
    pub resolver: Arc<dyn DomainResolver>,
    /// Mailbox-acceptance oracle
    pub oracle: Arc<dyn DeliverabilityOracle>,
    /// Terminal-state notification transport
    pub notifier: Arc<dyn Notifier>,
}

/// Main pipeline instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ValidationPipeline {
    /// Durable job store, the only source of truth for job state
    pub store: Arc<dyn JobRecordStore>,
    /// SQLite handle used for runtime state, when the pipeline owns one
    pub(crate) db: Option<Arc<Database>>,
    /// Per-address check composition shared by all units
    pub(crate) validator: Arc<AddressValidator>,
    /// Terminal-state notification transport
    pub(crate) notifier: Arc<dyn Notifier>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Concurrency and job-task bookkeeping
    pub(crate) execution: ExecutionState,
}

impl ValidationPipeline {
    /// Create a pipeline with the production collaborators
    ///
    /// This initializes all core components:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the DNS resolver, the HTTP oracle client and the webhook notifier
    /// - Resumes jobs left unfinished by a previous session
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        if db.was_unclean_shutdown().await? {
            tracing::warn!("Previous session did not shut down cleanly, resuming unfinished jobs");
        }
        // Mark that we're starting up (for unclean shutdown detection)
        db.set_clean_start().await?;

        let oracle = HttpOracle::new(&config.oracle)?;
        let components = PipelineComponents {
            store: db.clone(),
            resolver: Arc::new(DnsResolver::new(&config.resolver)),
            oracle: Arc::new(oracle),
            notifier: Arc::new(WebhookNotifier::new(config.notifications.webhooks.clone())),
        };

        let pipeline = Self::assemble(config, components, Some(db));
        pipeline.restore().await?;
        Ok(pipeline)
    }

    /// Create a pipeline around caller-supplied collaborators
    ///
    /// Unfinished jobs found in the store are resumed before this returns.
    pub async fn with_components(config: Config, components: PipelineComponents) -> Result<Self> {
        config.validate()?;
        let pipeline = Self::assemble(config, components, None);
        pipeline.restore().await?;
        Ok(pipeline)
    }

    fn assemble(config: Config, components: PipelineComponents, db: Option<Arc<Database>>) -> Self {
        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let validator = Arc::new(AddressValidator::new(
            &config,
            components.resolver,
            components.oracle,
        ));

        let execution = ExecutionState {
            unit_limit: Arc::new(tokio::sync::Semaphore::new(
                config.pipeline.max_concurrent_units,
            )),
            active_jobs: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        Self {
            store: components.store,
            db,
            validator,
            notifier: components.notifier,
            event_tx,
            config: Arc::new(config),
            execution,
        }
    }

    /// Subscribe to pipeline events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// ```no_run
    /// use mailsieve::{Config, ValidationPipeline};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let pipeline = ValidationPipeline::new(Config::default()).await?;
    ///
    ///     let mut events = pipeline.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "pipeline event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Oracle calls issued by this process so far, retries included
    pub fn oracle_calls(&self) -> u64 {
        self.validator.oracle_calls()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Run a store operation under the per-call timeout and the store retry budget
    pub(crate) async fn store_call<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.config.pipeline.store_timeout;
        with_retry(&self.config.pipeline.store_retry, || {
            let call = operation();
            async move {
                tokio::time::timeout(timeout, call)
                    .await
                    .map_err(|_| Error::StoreTimeout(timeout))?
            }
        })
        .await
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with validation and listens on the configured
    /// bind address (default: 127.0.0.1:6790).
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let pipeline = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(pipeline, config).await })
    }
}
