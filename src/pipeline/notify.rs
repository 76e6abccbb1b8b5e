//! Terminal-state notification transports.
//!
//! The pipeline calls [`Notifier::notify`] once per job, after it has claimed
//! the persisted `notified` flag. Delivery errors are reported back so the
//! pipeline can log and publish them; they never change the job outcome.

use crate::config::{WebhookConfig, WebhookEvent};
use crate::error::{Error, Result};
use crate::types::{JobId, JobStatus, JobSummary, WebhookPayload};
use async_trait::async_trait;
use futures::future::join_all;

/// Receives the terminal outcome of a job
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce that `job_id` reached `status`
    async fn notify(
        &self,
        job_id: &JobId,
        status: JobStatus,
        summary: &JobSummary,
        failure_reason: Option<&str>,
    ) -> Result<()>;
}

/// Posts a [`WebhookPayload`] to every webhook subscribed to the outcome
pub struct WebhookNotifier {
    webhooks: Vec<WebhookConfig>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier for the configured webhooks
    pub fn new(webhooks: Vec<WebhookConfig>) -> Self {
        Self {
            webhooks,
            client: reqwest::Client::new(),
        }
    }

    fn event_for(status: JobStatus) -> Option<(WebhookEvent, &'static str)> {
        match status {
            JobStatus::Completed => Some((WebhookEvent::OnComplete, "completed")),
            JobStatus::PartiallyCompleted => {
                Some((WebhookEvent::OnPartial, "partially_completed"))
            }
            JobStatus::Failed => Some((WebhookEvent::OnFailed, "failed")),
            JobStatus::Pending | JobStatus::Processing => None,
        }
    }

    async fn post(
        &self,
        webhook: &WebhookConfig,
        payload: &WebhookPayload,
    ) -> std::result::Result<(), String> {
        let mut request = self
            .client
            .post(&webhook.url)
            .json(payload)
            .timeout(webhook.timeout);

        if let Some(auth) = &webhook.auth_header {
            request = request.header("Authorization", auth);
        }

        match tokio::time::timeout(webhook.timeout, request.send()).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!(
                "webhook returned status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )),
            Ok(Err(e)) => Err(format!("failed to send webhook: {}", e)),
            Err(_) => Err(format!("webhook timed out after {:?}", webhook.timeout)),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        job_id: &JobId,
        status: JobStatus,
        summary: &JobSummary,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        let Some((event, event_name)) = Self::event_for(status) else {
            return Err(Error::Other(format!(
                "job {} is not terminal ({}), nothing to notify",
                job_id, status
            )));
        };

        let matching: Vec<_> = self
            .webhooks
            .iter()
            .filter(|w| w.events.contains(&event))
            .collect();
        if matching.is_empty() {
            return Ok(());
        }

        let payload = WebhookPayload {
            event: event_name.to_string(),
            job_id: job_id.clone(),
            status,
            summary: *summary,
            failure_reason: failure_reason.map(str::to_string),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let results = join_all(matching.iter().map(|w| self.post(w, &payload))).await;

        let mut failures = Vec::new();
        for (webhook, result) in matching.iter().zip(results) {
            match result {
                Ok(()) => tracing::debug!(url = %webhook.url, job_id = %job_id, "webhook sent successfully"),
                Err(e) => {
                    tracing::warn!(url = %webhook.url, job_id = %job_id, error = %e, "webhook failed");
                    failures.push(format!("{}: {}", webhook.url, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Other(failures.join("; ")))
        }
    }
}
