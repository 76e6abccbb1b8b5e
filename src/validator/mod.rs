//! Per-address validation
//!
//! [`AddressValidator`] composes three ordered, short-circuiting checks:
//!
//! 1. grammar ([`syntax`]) → `SyntaxInvalid`
//! 2. domain existence ([`DomainResolver`]) → `DomainNotFound`
//! 3. mailbox acceptance ([`DeliverabilityOracle`]) → `Valid` / `MailboxRejected`
//!
//! Malformed input is a verdict, never an error. Provider trouble is retried within
//! the configured budget and then downgraded to `OracleUnavailable` with zero
//! confidence. `validate` never fails.
//!
//! The pipeline calls [`AddressValidator::precheck`] and
//! [`AddressValidator::check_mailbox`] separately so it can look for a job abort
//! between them.

pub mod oracle;
pub mod resolver;
pub mod syntax;

pub use oracle::{DeliverabilityOracle, HttpOracle, MailboxCheck, MailboxOutcome};
pub use resolver::{DnsResolver, DomainResolver};

use crate::config::{Config, RetryConfig};
use crate::error::{OracleError, ResolveError};
use crate::rate_limiter::RateLimiter;
use crate::retry::with_retry;
use crate::types::{ReasonCode, ValidationVerdict};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Confidence for syntax and domain verdicts
pub const DEFINITIVE_CONFIDENCE: f64 = 1.0;

/// Confidence for oracle answers that carry none
pub const DEFAULT_ORACLE_CONFIDENCE: f64 = 0.8;

/// Stateless check composition shared by every validation unit
pub struct AddressValidator {
    resolver: Arc<dyn DomainResolver>,
    oracle: Arc<dyn DeliverabilityOracle>,
    limiter: RateLimiter,
    identity: String,
    oracle_timeout: Duration,
    oracle_retry: RetryConfig,
    resolver_timeout: Duration,
    resolver_retry: RetryConfig,
    oracle_calls: AtomicU64,
}

impl AddressValidator {
    /// Build a validator around the given collaborators
    pub fn new(
        config: &Config,
        resolver: Arc<dyn DomainResolver>,
        oracle: Arc<dyn DeliverabilityOracle>,
    ) -> Self {
        Self {
            resolver,
            oracle,
            limiter: RateLimiter::new(config.oracle.rate_limit_per_second),
            identity: config.oracle.identity.clone(),
            oracle_timeout: config.oracle.timeout,
            oracle_retry: config.oracle.retry.clone(),
            resolver_timeout: config.resolver.timeout,
            resolver_retry: config.resolver.retry.clone(),
            oracle_calls: AtomicU64::new(0),
        }
    }

    /// Number of oracle calls issued so far, retries included
    pub fn oracle_calls(&self) -> u64 {
        self.oracle_calls.load(Ordering::Relaxed)
    }

    /// Run all checks for one address
    pub async fn validate(&self, address: &str) -> ValidationVerdict {
        match self.precheck(address).await {
            Some(verdict) => verdict,
            None => self.check_mailbox(address).await,
        }
    }

    /// Grammar and domain checks
    ///
    /// Returns the verdict if one of them already decides the address, or `None`
    /// when the mailbox check is still needed.
    pub async fn precheck(&self, address: &str) -> Option<ValidationVerdict> {
        if !syntax::is_valid_syntax(address) {
            return Some(ValidationVerdict::new(
                address,
                ReasonCode::SyntaxInvalid,
                DEFINITIVE_CONFIDENCE,
            ));
        }

        let Some(domain) = syntax::domain_of(address) else {
            return Some(ValidationVerdict::new(
                address,
                ReasonCode::SyntaxInvalid,
                DEFINITIVE_CONFIDENCE,
            ));
        };

        let timeout = self.resolver_timeout;
        let name = domain.as_str();
        let lookup = with_retry(&self.resolver_retry, || async move {
            match tokio::time::timeout(timeout, self.resolver.domain_exists(name)).await {
                Ok(result) => result,
                Err(_) => Err(ResolveError::Timeout),
            }
        })
        .await;

        match lookup {
            Ok(true) => None,
            Ok(false) => Some(ValidationVerdict::new(
                address,
                ReasonCode::DomainNotFound,
                DEFINITIVE_CONFIDENCE,
            )),
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "Domain lookup budget exhausted");
                Some(ValidationVerdict::new(
                    address,
                    ReasonCode::OracleUnavailable,
                    0.0,
                ))
            }
        }
    }

    /// Mailbox-acceptance check against the oracle
    ///
    /// Every attempt waits for a rate-limiter permit first.
    pub async fn check_mailbox(&self, address: &str) -> ValidationVerdict {
        let timeout = self.oracle_timeout;
        let answer = with_retry(&self.oracle_retry, || async move {
            self.limiter.acquire().await;
            self.oracle_calls.fetch_add(1, Ordering::Relaxed);
            match tokio::time::timeout(timeout, self.oracle.check_mailbox(&self.identity, address))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout),
            }
        })
        .await;

        match answer {
            Ok(check) => {
                let confidence = check.confidence.unwrap_or(DEFAULT_ORACLE_CONFIDENCE);
                let (reason, confidence) = match check.result {
                    MailboxOutcome::Accepted => (ReasonCode::Valid, confidence),
                    MailboxOutcome::Rejected => (ReasonCode::MailboxRejected, confidence),
                    // An undecided oracle is no better than an absent one
                    MailboxOutcome::Unknown => (ReasonCode::OracleUnavailable, 0.0),
                };
                ValidationVerdict::new(address, reason, confidence)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Oracle gave no answer within the retry budget");
                ValidationVerdict::new(address, ReasonCode::OracleUnavailable, 0.0)
            }
        }
    }
}
