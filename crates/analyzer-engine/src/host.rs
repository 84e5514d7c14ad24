use std::net::{IpAddr, ToSocketAddrs};

use tracing::debug;

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub address: String,
}

impl HostIdentity {
    /// Local host name and one address it resolves to, IPv4 preferred.
    /// Either field falls back to `unknown`.
    pub fn detect() -> Self {
        let hostname = match hostname::get() {
            Ok(name) => name.to_string_lossy().trim().to_string(),
            Err(err) => {
                debug!(error = %err, "hostname lookup failed");
                String::new()
            }
        };
        if hostname.is_empty() {
            return Self::unknown();
        }
        let address = resolve(&hostname)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self { hostname, address }
    }

    pub fn unknown() -> Self {
        Self {
            hostname: UNKNOWN.to_string(),
            address: UNKNOWN.to_string(),
        }
    }
}

fn resolve(hostname: &str) -> Option<IpAddr> {
    let addrs: Vec<IpAddr> = match (hostname, 0).to_socket_addrs() {
        Ok(addrs) => addrs.map(|addr| addr.ip()).collect(),
        Err(err) => {
            debug!(hostname, error = %err, "host address resolution failed");
            return None;
        }
    };
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}
