//! Listen address resolution
//!
//! Accepts `host:port`, `:port`, `[v6]:port`, hostnames and service names in
//! place of a numeric port (`[::1]:http`). Names are resolved by the system
//! resolver through `getaddrinfo`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use dns_lookup::{AddrInfoHints, SockType, getaddrinfo};

use crate::error::{Error, Result};

/// Resolve a listen address string into a socket address
pub async fn resolve(addr: &str) -> Result<SocketAddr> {
    let (host, service) =
        split_host_port(addr).map_err(|reason| Error::invalid_address(addr, reason))?;
    let (host, service) = (host.to_string(), service.to_string());

    tokio::task::spawn_blocking(move || lookup(&host, &service))
        .await
        .map_err(|e| Error::invalid_address(addr, e.to_string()))?
        .map_err(|reason| Error::invalid_address(addr, reason))
}

/// Blocking `getaddrinfo` lookup of a tcp host and service.
///
/// An empty host listens on all interfaces; an empty service picks a free port.
fn lookup(host: &str, service: &str) -> std::result::Result<SocketAddr, String> {
    let service = if service.is_empty() { "0" } else { service };
    if service.bytes().all(|b| b.is_ascii_digit()) && service.parse::<u16>().is_err() {
        return Err(format!("invalid port {}", service));
    }
    let node = (!host.is_empty()).then_some(host);
    let hints = AddrInfoHints {
        socktype: SockType::Stream.into(),
        ..AddrInfoHints::default()
    };

    let info = getaddrinfo(node, Some(service), Some(hints))
        .map_err(|e| std::io::Error::from(e).to_string())?
        .next()
        .ok_or("no addresses found")?
        .map_err(|e| e.to_string())?;

    if node.is_none() {
        return Ok(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            info.sockaddr.port(),
        ));
    }
    Ok(info.sockaddr)
}

/// Split `host:port`, stripping brackets from an IPv6 host
fn split_host_port(addr: &str) -> std::result::Result<(&str, &str), &'static str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let end = rest.find(']').ok_or("missing ']' in address")?;
        let host = &rest[..end];
        let port = rest[end + 1..]
            .strip_prefix(':')
            .ok_or("missing port in address")?;
        return Ok((host, port));
    }

    let idx = addr.rfind(':').ok_or("missing port in address")?;
    let host = &addr[..idx];
    if host.contains(':') {
        return Err("too many colons in address");
    }
    if host.contains('[') || host.contains(']') {
        return Err("unexpected bracket in address");
    }
    Ok((host, &addr[idx + 1..]))
}
