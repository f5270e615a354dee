//! Local address detection for the API server certificate.

use kubeboot_types::{KubebootError, Result};
use std::io;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use tracing::{debug, warn};

/// IPv4 addresses of `localhost` and of this machine's hostname.
///
/// Failing to resolve `localhost` is an error; failing to resolve the
/// hostname is only logged.
pub fn detect_local_ips() -> Result<Vec<String>> {
    let mut addrs = resolve_ipv4("localhost")
        .map_err(|e| KubebootError::Other(format!("Cannot resolve localhost: {}", e)))?;

    match gethostname::gethostname().into_string() {
        Ok(hostname) => match resolve_ipv4(&hostname) {
            Ok(more) => addrs.extend(more),
            Err(e) => warn!("Cannot resolve hostname {}: {}", hostname, e),
        },
        Err(raw) => warn!("Hostname {:?} is not valid UTF-8", raw),
    }

    let mut unique: Vec<String> = Vec::with_capacity(addrs.len());
    for addr in addrs {
        let addr = addr.to_string();
        if !unique.contains(&addr) {
            unique.push(addr);
        }
    }

    debug!("Detected local addresses: {:?}", unique);
    Ok(unique)
}

fn resolve_ipv4(host: &str) -> io::Result<Vec<Ipv4Addr>> {
    Ok((host, 0)
        .to_socket_addrs()?
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ipv4_filters_v6() {
        let addrs = resolve_ipv4("127.0.0.1").unwrap();
        assert_eq!(addrs, vec![Ipv4Addr::LOCALHOST]);

        assert!(resolve_ipv4("::1").unwrap().is_empty());
    }

    #[test]
    fn test_detect_local_ips_are_unique_ipv4() {
        // Only fails on machines without a resolvable localhost.
        let Ok(ips) = detect_local_ips() else { return };

        for ip in &ips {
            assert!(ip.parse::<Ipv4Addr>().is_ok(), "{} is not IPv4", ip);
        }
        let mut sorted = ips.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ips.len());
    }
}
