// ============================================
// File: crates/decada-transport/src/dns.rs
// ============================================
//! # Bounded DNS Resolver
//!
//! Resolves hostnames through the system resolver with a fixed per-attempt
//! timeout and a capped number of attempts. IPv4 results are preferred.
//! IP literals are returned without a lookup.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::Resolver;

/// Default number of lookup attempts.
pub const DEFAULT_DNS_ATTEMPTS: u32 = 3;

/// Default per-attempt timeout.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pause between attempts.
pub const DEFAULT_DNS_RETRY_DELAY: Duration = Duration::from_millis(250);

/// System resolver with bounded retry.
#[derive(Debug, Clone)]
pub struct DnsResolver {
    attempts: u32,
    timeout: Duration,
    retry_delay: Duration,
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new(DEFAULT_DNS_ATTEMPTS, DEFAULT_DNS_TIMEOUT, DEFAULT_DNS_RETRY_DELAY)
    }
}

impl DnsResolver {
    /// Creates a resolver. `attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(attempts: u32, timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            timeout,
            retry_delay,
        }
    }

    async fn lookup_once(&self, host: &str) -> Result<Option<IpAddr>> {
        // Port is irrelevant; lookup_host needs one.
        let lookup = tokio::time::timeout(self.timeout, lookup_host((host, 0)))
            .await
            .map_err(|_| {
                TransportError::timeout(
                    format!("resolve {host}"),
                    u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                )
            })??;

        let addrs: Vec<IpAddr> = lookup.map(|addr| addr.ip()).collect();
        Ok(addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied())
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        for attempt in 1..=self.attempts {
            match self.lookup_once(host).await {
                Ok(Some(ip)) => {
                    debug!(host, %ip, attempt, "Resolved");
                    return Ok(ip);
                }
                Ok(None) => warn!(host, attempt, "No addresses returned"),
                Err(e) => warn!(host, attempt, error = %e, "Lookup failed"),
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(TransportError::DnsResolution {
            host: host.to_string(),
            attempts: self.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ip_literal_passthrough() {
        let resolver = DnsResolver::default();
        assert_eq!(
            resolver.resolve("10.1.2.3").await.unwrap(),
            "10.1.2.3".parse::<IpAddr>().unwrap()
        );
        assert!(resolver.resolve("::1").await.unwrap().is_ipv6());
    }

    #[tokio::test]
    async fn test_localhost_resolves() {
        let resolver = DnsResolver::new(1, Duration::from_secs(5), Duration::ZERO);
        let ip = resolver.resolve("localhost").await.unwrap();
        assert!(ip.is_loopback());
    }

    #[tokio::test]
    async fn test_unresolvable_exhausts_attempts() {
        let resolver = DnsResolver::new(2, Duration::from_secs(5), Duration::ZERO);
        let err = resolver.resolve("no-such-host.invalid").await.unwrap_err();
        assert!(matches!(err, TransportError::DnsResolution { attempts: 2, .. }));
    }

    #[test]
    fn test_attempts_clamped() {
        let resolver = DnsResolver::new(0, Duration::from_secs(1), Duration::ZERO);
        assert_eq!(resolver.attempts, 1);
    }
}
