use crate::error::ResolutionError;
use std::net::IpAddr;
use tracing::debug;

/// Resolve a hostname or literal address to one IP, preferring IPv4.
pub async fn resolve(target: &str) -> Result<IpAddr, ResolutionError> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((target, 0))
        .await
        .map_err(|source| ResolutionError::Lookup { target: target.to_string(), source })?
        .map(|sa| sa.ip())
        .collect();
    debug!(target, count = addrs.len(), "Resolved addresses.");

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ResolutionError::NoAddress { target: target.to_string() })
}
