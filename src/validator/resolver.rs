//! Domain existence checks
//!
//! The validator only needs a yes/no answer per domain. [`DomainResolver`] is the
//! seam; [`DnsResolver`] answers it with an MX lookup and falls back to A/AAAA
//! records the way SMTP delivery does (RFC 5321 §5.1).

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{ResolverConfig as DnsConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError as DnsError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;

/// Answers whether a domain can receive mail
#[async_trait::async_trait]
pub trait DomainResolver: Send + Sync {
    /// `Ok(false)` means the domain definitively does not exist or has no mail
    /// hosts. Infrastructure trouble is an `Err` and may be retried.
    async fn domain_exists(&self, domain: &str) -> Result<bool, ResolveError>;
}

/// DNS-backed [`DomainResolver`]
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// Build a resolver from the host's resolv.conf, falling back to public
    /// upstreams when it cannot be read
    pub fn new(config: &ResolverConfig) -> Self {
        let (dns_config, mut opts) = match trust_dns_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read system DNS configuration, using defaults");
                (DnsConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = config.timeout;
        // Retries are driven by the validator's own budget
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(dns_config, opts),
        }
    }

}

#[async_trait::async_trait]
impl DomainResolver for DnsResolver {
    async fn domain_exists(&self, domain: &str) -> Result<bool, ResolveError> {
        // Trailing dot keeps the search list out of the lookup
        let fqdn = format!("{}.", domain.trim_end_matches('.'));

        match self.resolver.mx_lookup(fqdn.as_str()).await {
            Ok(mx) if mx.iter().next().is_some() => return Ok(true),
            Ok(_) => {}
            Err(e) => match classify(&e) {
                Lookup::NoSuchDomain => return Ok(false),
                Lookup::NoRecords => {}
                Lookup::Transient(err) => return Err(err),
            },
        }

        tracing::debug!(domain, "No MX records, trying address records");
        match self.resolver.lookup_ip(fqdn.as_str()).await {
            Ok(ips) => Ok(ips.iter().next().is_some()),
            Err(e) => match classify(&e) {
                Lookup::NoSuchDomain | Lookup::NoRecords => Ok(false),
                Lookup::Transient(err) => Err(err),
            },
        }
    }
}

#[derive(Debug, PartialEq)]
enum Lookup {
    /// NXDOMAIN
    NoSuchDomain,
    /// The name exists but has no records of the requested type
    NoRecords,
    Transient(ResolveError),
}

fn classify(e: &DnsError) -> Lookup {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            if *response_code == ResponseCode::NXDomain {
                Lookup::NoSuchDomain
            } else {
                Lookup::NoRecords
            }
        }
        ResolveErrorKind::Timeout => Lookup::Transient(ResolveError::Timeout),
        _ => Lookup::Transient(ResolveError::Failed(e.to_string())),
    }
}
