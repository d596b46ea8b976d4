//! Identity of a rate-limited subject.

use std::fmt;
use std::net::IpAddr;

/// The client a request is attributed to.
///
/// Derived once per request from the resolved client address. Storage keys
/// for counters are built from it so that distinct clients never share a
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey {
    ip: IpAddr,
}

impl ClientKey {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip: ip.to_canonical(),
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Storage key for a counter of the given kind.
    pub fn counter_key(&self, kind: &str) -> String {
        format!("{kind}:{}", self.ip)
    }

    /// Storage key for a counter scoped to one endpoint.
    pub fn endpoint_counter_key(&self, kind: &str, endpoint: &str) -> String {
        format!("{kind}:{}:{endpoint}", self.ip)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}
