//! Deliverability oracle client
//!
//! The oracle is a provider service that answers "would this mailbox accept mail
//! from our identity". Answers are best-effort, so the response carries an
//! optional confidence.

use crate::config::OracleConfig;
use crate::error::OracleError;
use serde::{Deserialize, Serialize};

/// Oracle answer for one address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailboxOutcome {
    /// Mailbox will accept mail
    Accepted,
    /// Mailbox definitively refuses mail
    Rejected,
    /// Oracle could not decide
    Unknown,
}

/// Result of a mailbox check
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MailboxCheck {
    /// What the oracle decided
    pub result: MailboxOutcome,
    /// Oracle-reported confidence, if any
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Mailbox-acceptance oracle, scoped to a sending identity
#[async_trait::async_trait]
pub trait DeliverabilityOracle: Send + Sync {
    /// Ask whether `address` accepts mail from `identity`
    async fn check_mailbox(&self, identity: &str, address: &str)
    -> Result<MailboxCheck, OracleError>;
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    identity: &'a str,
    region: &'a str,
    address: &'a str,
}

/// HTTP [`DeliverabilityOracle`] speaking JSON to `{endpoint}/v1/mailbox-checks`
pub struct HttpOracle {
    client: reqwest::Client,
    checks_url: String,
    region: String,
    api_key: Option<String>,
}

impl HttpOracle {
    /// Build a client for the configured endpoint
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        let base = url::Url::parse(&config.endpoint).map_err(|e| {
            OracleError::RequestRejected(format!("invalid endpoint {:?}: {}", config.endpoint, e))
        })?;
        let checks_url = format!("{}/v1/mailbox-checks", base.as_str().trim_end_matches('/'));

        Ok(Self {
            client,
            checks_url,
            region: config.region.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl DeliverabilityOracle for HttpOracle {
    async fn check_mailbox(
        &self,
        identity: &str,
        address: &str,
    ) -> Result<MailboxCheck, OracleError> {
        let mut request = self.client.post(&self.checks_url).json(&CheckRequest {
            identity,
            region: &self.region,
            address,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::Throttled);
        }
        if status.is_server_error() {
            return Err(OracleError::Unavailable(format!("oracle returned {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::RequestRejected(format!(
                "oracle returned {}: {}",
                status, body
            )));
        }

        response.json::<MailboxCheck>().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Unavailable(format!("malformed oracle response: {}", e))
            }
        })
    }
}
