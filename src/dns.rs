//! Mail exchanger lookups (MX, with A record fallback) for the root domain.

use crate::config::Config;
use crate::error::{AppError, Result};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{
    LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig, ResolverOpts,
};

/// Represents the result of a mail server lookup.
#[derive(Debug, Clone)]
pub(crate) struct MailServer {
    /// The domain name or IP address of the mail server.
    pub exchange: String,
    /// The preference value (lower is more preferred), typically from MX records.
    /// Will be `u16::MAX` if derived from an A record.
    pub preference: u16,
}

/// Creates a DNS resolver using the configured name servers.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let mut resolver_config = ResolverConfig::new();

    for server_str in &config.dns_servers {
        let ip_addr = IpAddr::from_str(server_str).map_err(|e| {
            tracing::error!(
                "Invalid DNS server IP address in config: '{}' - {}",
                server_str,
                e
            );
            AppError::Config(format!("Invalid DNS server IP address: {}", server_str))
        })?;

        let socket_addr = SocketAddr::new(ip_addr, 53);
        for protocol in [Protocol::Udp, Protocol::Tcp] {
            resolver_config.add_name_server(NameServerConfig {
                socket_addr,
                protocol,
                tls_dns_name: None,
                trust_negative_responses: true,
                bind_addr: None,
            });
        }
    }

    let mut resolver_opts = ResolverOpts::default();
    resolver_opts.timeout = config.dns_timeout;
    resolver_opts.attempts = 2;
    resolver_opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

    let resolver = TokioAsyncResolver::tokio(resolver_config, resolver_opts);
    tracing::debug!(
        "DNS resolver configured with {} servers.",
        config.dns_servers.len()
    );
    Ok(resolver)
}

fn classify_resolve_error(
    e: trust_dns_resolver::error::ResolveError,
    domain: &str,
) -> AppError {
    let error_string = format!("{:?}", e.kind());
    if error_string.contains("NoRecordsFound") {
        AppError::NoDnsRecords(domain.to_string())
    } else if error_string.contains("NXDomain") || error_string.contains("Name does not exist") {
        AppError::NxDomain(domain.to_string())
    } else if error_string.contains("Timeout") {
        AppError::DnsTimeout(domain.to_string())
    } else {
        AppError::Dns(e)
    }
}

/// Resolves the most preferred mail server for a domain, checking MX records
/// first, then falling back to A records.
///
/// # Returns
/// * `Ok(MailServer)` containing the most preferred mail server found.
/// * `Err(AppError)` if resolution fails (NXDOMAIN, no records, timeout).
pub(crate) async fn resolve_mail_server(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<MailServer> {
    tracing::debug!("Performing DNS MX lookup for {}", domain);

    match resolver.mx_lookup(domain).await {
        Ok(mx_response) => {
            let best_mx = mx_response.iter().min_by_key(|r| r.preference());
            match best_mx {
                Some(mx) => {
                    let exchange = mx.exchange().to_utf8().trim_end_matches('.').to_string();
                    if exchange.is_empty() {
                        return Err(AppError::NoDnsRecords(format!(
                            "Empty exchange in MX record for {}",
                            domain
                        )));
                    }
                    tracing::info!(
                        "Found MX for {}: {} (Pref: {})",
                        domain,
                        exchange,
                        mx.preference()
                    );
                    Ok(MailServer {
                        exchange,
                        preference: mx.preference(),
                    })
                }
                None => resolve_a_record_fallback(resolver, domain).await,
            }
        }
        Err(e) => match classify_resolve_error(e, domain) {
            AppError::NoDnsRecords(_) => {
                tracing::debug!(
                    "No MX records found for {}. Trying A record fallback...",
                    domain
                );
                resolve_a_record_fallback(resolver, domain).await
            }
            other => {
                tracing::warn!("MX lookup for {} failed: {}", domain, other);
                Err(other)
            }
        },
    }
}

/// Attempts to resolve an A record for the domain as a fallback mail server.
async fn resolve_a_record_fallback(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<MailServer> {
    tracing::debug!("Attempting A record fallback for {}", domain);
    match resolver.lookup_ip(domain).await {
        Ok(a_response) => match a_response.iter().next() {
            Some(ip_addr) => {
                tracing::info!("Using A record for {} as mail server: {}", domain, ip_addr);
                Ok(MailServer {
                    exchange: ip_addr.to_string(),
                    preference: u16::MAX,
                })
            }
            None => Err(AppError::NoDnsRecords(domain.to_string())),
        },
        Err(e) => {
            let err = classify_resolve_error(e, domain);
            tracing::debug!("A record fallback for {} failed: {}", domain, err);
            Err(err)
        }
    }
}

/// Maps a lookup outcome onto the scorer's `mail_domain_verified` signal.
///
/// Only a definitive negative answer counts as `false`; timeouts and other
/// resolver failures are inconclusive.
pub(crate) fn verification_from_lookup(outcome: &Result<MailServer>) -> Option<bool> {
    match outcome {
        Ok(_) => Some(true),
        Err(AppError::NxDomain(_)) | Err(AppError::NoDnsRecords(_)) => Some(false),
        Err(_) => None,
    }
}

/// Checks whether the root domain can receive mail, bounded by `timeout`.
///
/// # Returns
/// * `Some(true)` if an MX or A record was found.
/// * `Some(false)` if the domain does not exist or has no records.
/// * `None` if the check timed out or failed otherwise.
pub(crate) async fn check_mail_domain(
    resolver: &TokioAsyncResolver,
    domain: &str,
    timeout: Duration,
) -> Option<bool> {
    match tokio::time::timeout(timeout, resolve_mail_server(resolver, domain)).await {
        Ok(outcome) => {
            if let Ok(server) = &outcome {
                tracing::debug!(target: "mine_task",
                    "Mail for {} is handled by {} (preference {})",
                    domain, server.exchange, server.preference
                );
            }
            let verified = verification_from_lookup(&outcome);
            tracing::debug!(target: "mine_task", "Mail domain check for {}: {:?}", domain, verified);
            verified
        }
        Err(_) => {
            tracing::warn!(target: "mine_task", "Mail domain check for {} timed out", domain);
            None
        }
    }
}
