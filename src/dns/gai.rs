//! System resolver using getaddrinfo.
//!
//! Delegates to `tokio::net::lookup_host`, which runs `getaddrinfo` on the
//! blocking thread pool, so system DNS configuration is respected.

use super::resolve::{not_found, Name, Resolve, Resolving};
use std::net::IpAddr;

/// System DNS resolver.
///
/// Literal IP addresses are answered without a lookup.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name, port: u16) -> Resolving {
        Box::pin(async move {
            if let Ok(ip) = name.as_str().parse::<IpAddr>() {
                return Ok(vec![(ip, port).into()]);
            }

            tracing::debug!(host = %name, "resolving via getaddrinfo");
            let addrs: Vec<_> = tokio::net::lookup_host((name.as_str(), port))
                .await
                .map_err(|e| {
                    tracing::debug!(host = %name, error = %e, "DNS resolution failed");
                    not_found(&name)
                })?
                .collect();

            if addrs.is_empty() {
                return Err(not_found(&name));
            }
            tracing::debug!(host = %name, count = addrs.len(), "DNS resolution complete");
            Ok(addrs)
        })
    }
}
