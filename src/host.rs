//! Host identifier used to namespace mirror indices.

use std::fmt;
use std::net::IpAddr;
use std::sync::OnceLock;

/// Identifier of the current host, normally its IPv4 address.
///
/// Empty when no usable address exists; index names then fall back to their
/// bare prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostId(String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        HostId(id.into())
    }

    /// Detect the host identifier once per process.
    pub fn process() -> HostId {
        static HOST: OnceLock<HostId> = OnceLock::new();
        HOST.get_or_init(|| HostId(detect_host())).clone()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pick the first non-loopback IPv4 address, or `""` if there is none.
pub fn select_host<I>(addrs: I) -> String
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(v4.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// Enumerate interface addresses and select the host identifier.
///
/// Enumeration failures are reported as a diagnostic and yield `""`.
#[cfg(unix)]
pub fn detect_host() -> String {
    use std::net::Ipv4Addr;

    match nix::ifaddrs::getifaddrs() {
        Ok(ifaddrs) => select_host(ifaddrs.filter_map(|ifaddr| {
            let address = ifaddr.address?;
            let sin = address.as_sockaddr_in()?;
            Some(IpAddr::V4(Ipv4Addr::from(sin.ip())))
        })),
        Err(e) => {
            tracing::warn!(error = %e, "failed to enumerate interface addresses");
            String::new()
        }
    }
}

#[cfg(not(unix))]
pub fn detect_host() -> String {
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn skips_loopback_and_ipv6() {
        let addrs = vec![
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
        ];
        assert_eq!(select_host(addrs), "10.0.0.5");
    }

    #[test]
    fn first_candidate_wins() {
        let addrs = vec![
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
        ];
        assert_eq!(select_host(addrs), "10.0.0.5");
    }

    #[test]
    fn no_candidate_is_empty() {
        let addrs = vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)];
        assert_eq!(select_host(addrs), "");
        assert!(HostId::new(select_host(Vec::new())).is_empty());
    }

    #[test]
    fn process_host_is_stable() {
        assert_eq!(HostId::process(), HostId::process());
    }
}
