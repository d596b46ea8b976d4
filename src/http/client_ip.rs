//! Client address resolution.
//!
//! The TCP peer is the client unless it is a configured trusted proxy. In
//! that case the forwarding header is walked from the right, skipping further
//! trusted hops, and the first untrusted address is the client. A malformed
//! entry stops the walk and the last trusted hop is used instead.

use axum::http::HeaderMap;
use std::net::IpAddr;

use crate::security::Whitelist;

pub fn resolve_client_ip(
    peer: IpAddr,
    headers: &HeaderMap,
    trusted_proxies: &Whitelist,
    real_ip_header: &str,
) -> IpAddr {
    if !trusted_proxies.contains(peer) {
        if headers.contains_key(real_ip_header) {
            tracing::debug!(peer = %peer, header = real_ip_header, "Ignoring forwarding header from untrusted peer");
        }
        return peer;
    }

    let mut client = peer;
    let hops = headers
        .get_all(real_ip_header)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect::<Vec<_>>();

    for hop in hops.into_iter().rev() {
        let Ok(ip) = hop.parse::<IpAddr>() else {
            tracing::warn!(peer = %peer, value = hop, "Malformed forwarding header entry");
            break;
        };
        client = ip;
        if !trusted_proxies.contains(ip) {
            break;
        }
    }
    client
}
