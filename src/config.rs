//! Configuration types for mailsieve

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration for [`ValidationPipeline`](crate::ValidationPipeline)
///
/// Every section has working defaults, so `Config::default()` only needs an
/// oracle endpoint to be useful.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Deliverability oracle connection and call budget
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Domain-resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Fan-out sizing, concurrency and deadlines
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Terminal-state notifications
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(config_error(
                "batch size must be at least 1",
                "pipeline.batch_size",
            ));
        }
        if self.pipeline.max_concurrent_units == 0 {
            return Err(config_error(
                "max concurrent units must be at least 1",
                "pipeline.max_concurrent_units",
            ));
        }
        if self.oracle.retry.max_attempts == 0 {
            return Err(config_error(
                "oracle attempt budget must be at least 1",
                "oracle.retry.max_attempts",
            ));
        }
        if self.resolver.retry.max_attempts == 0 {
            return Err(config_error(
                "resolver attempt budget must be at least 1",
                "resolver.retry.max_attempts",
            ));
        }
        if self.pipeline.store_retry.max_attempts == 0 {
            return Err(config_error(
                "store attempt budget must be at least 1",
                "pipeline.store_retry.max_attempts",
            ));
        }
        if self.oracle.rate_limit_per_second == Some(0) {
            return Err(config_error(
                "oracle rate limit must be positive (use null for unlimited)",
                "oracle.rate_limit_per_second",
            ));
        }
        if self.pipeline.job_deadline.is_zero() {
            return Err(config_error(
                "job deadline must be positive",
                "pipeline.job_deadline",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

/// Deliverability oracle configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct OracleConfig {
    /// Base URL of the oracle service
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,

    /// Provider region the identity is registered in (default: "us-east-1")
    #[serde(default = "default_region")]
    pub region: String,

    /// Sending identity (verified domain) used to scope checks
    #[serde(default)]
    pub identity: String,

    /// Optional bearer token sent with every call
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout (default: 10 seconds)
    #[serde(default = "default_oracle_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Process-wide call ceiling per second (None = unlimited, default: 14)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: Option<u64>,

    /// Retry budget for transient oracle failures (default: 3 attempts)
    #[serde(default = "default_oracle_retry")]
    pub retry: RetryConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            region: default_region(),
            identity: String::new(),
            api_key: None,
            timeout: default_oracle_timeout(),
            rate_limit_per_second: default_rate_limit(),
            retry: default_oracle_retry(),
        }
    }
}

/// Domain-resolution configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResolverConfig {
    /// Per-lookup timeout (default: 5 seconds)
    #[serde(default = "default_resolver_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Retry budget (default: 2 attempts, i.e. one retry)
    #[serde(default = "default_resolver_retry")]
    pub retry: RetryConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: default_resolver_timeout(),
            retry: default_resolver_retry(),
        }
    }
}

/// Fan-out and execution settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PipelineConfig {
    /// Addresses per batch (default: 50)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum validation units running at once across all jobs (default: 32)
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,

    /// Overall deadline after which an unfinished job is force-failed (default: 1 hour)
    #[serde(default = "default_job_deadline", with = "duration_serde")]
    pub job_deadline: Duration,

    /// Timeout for a single store call (default: 10 seconds)
    #[serde(default = "default_store_timeout", with = "duration_serde")]
    pub store_timeout: Duration,

    /// Retry budget for store calls made by units (default: 3 attempts)
    #[serde(default = "default_store_retry")]
    pub store_retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrent_units: default_max_concurrent_units(),
            job_deadline: default_job_deadline(),
            store_timeout: default_store_timeout(),
            store_retry: default_store_retry(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 200 ms)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 5 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Same backoff shape with a different attempt budget
    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./mailsieve.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Notification configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationConfig {
    /// Webhook configurations
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Terminal outcomes that trigger this webhook
    pub events: Vec<WebhookEvent>,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Webhook trigger event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum WebhookEvent {
    /// Job finished with every address valid
    OnComplete,
    /// Job finished with a mix of valid and invalid addresses
    OnPartial,
    /// Job failed (no valid address, aborted, or deadline exceeded)
    OnFailed,
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

// Default value functions
fn default_oracle_endpoint() -> String {
    "http://127.0.0.1:8085".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_oracle_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_rate_limit() -> Option<u64> {
    Some(14)
}

fn default_oracle_retry() -> RetryConfig {
    RetryConfig::default()
}

fn default_resolver_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_resolver_retry() -> RetryConfig {
    RetryConfig::default().with_attempts(2)
}

fn default_batch_size() -> usize {
    50
}

fn default_max_concurrent_units() -> usize {
    32
}

fn default_job_deadline() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_store_retry() -> RetryConfig {
    RetryConfig::default()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("mailsieve.db")
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for retry delays)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
