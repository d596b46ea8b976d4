//! Clients exempt from abuse rejection.
//!
//! Entries are single addresses (`203.0.113.7`) or CIDR prefixes
//! (`10.0.0.0/8`, `2001:db8::/32`). IPv4-mapped IPv6 peers also match
//! IPv4 entries.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::IpAddr;
use thiserror::Error;

/// Errors produced while parsing whitelist entries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WhitelistError {
    #[error("invalid address in whitelist entry '{0}'")]
    InvalidAddress(String),

    #[error("invalid prefix length in whitelist entry '{0}'")]
    InvalidPrefix(String),
}

/// A bare address becomes a single-host network.
fn parse_entry(entry: &str) -> Result<IpNet, WhitelistError> {
    let entry = entry.trim();
    if let Ok(net) = entry.parse::<IpNet>() {
        return Ok(net);
    }

    if let Some((addr, _)) = entry.split_once('/') {
        return Err(match addr.parse::<IpAddr>() {
            Ok(_) => WhitelistError::InvalidPrefix(entry.to_string()),
            Err(_) => WhitelistError::InvalidAddress(entry.to_string()),
        });
    }

    let host = match entry.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Ipv4Net::new(v4, 32).map(IpNet::V4),
        Ok(IpAddr::V6(v6)) => Ipv6Net::new(v6, 128).map(IpNet::V6),
        Err(_) => return Err(WhitelistError::InvalidAddress(entry.to_string())),
    };
    host.map_err(|_| WhitelistError::InvalidPrefix(entry.to_string()))
}

/// Read-only set of exempt clients.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<IpNet>,
}

impl Whitelist {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, WhitelistError> {
        let entries = entries
            .iter()
            .map(|e| parse_entry(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let canonical = ip.to_canonical();
        self.entries
            .iter()
            .any(|net| net.contains(&ip) || net.contains(&canonical))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
