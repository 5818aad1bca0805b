//! Visitor address extraction from HTTP headers with trust validation
//!
//! - `Forwarded` (RFC 7239) and `X-Forwarded-For` are honored only in `standard` mode
//! - `CF-Connecting-IP` is honored only in `cloudflare` mode
//! - everything else falls back to the socket peer address

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;

use crate::config::{GeoConfig, TrustedProxyMode};

/// Extract the visitor's address according to the trust configuration
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &GeoConfig) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

/// Address to hand to the geolocation provider, if any.
///
/// Private, loopback and link-local addresses mean nothing to a geolocation service; for those
/// the provider is left to infer the caller itself.
pub fn forwardable_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &GeoConfig,
) -> Option<IpAddr> {
    if !config.forward_client_ip {
        return None;
    }

    let mut ip = extract_client_ip(headers, socket_addr, config);
    if config.ip_anonymization {
        ip = anonymize_ip(ip);
    }

    is_public(ip).then_some(ip)
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn extract_standard_ip(headers: &HeaderMap, config: &GeoConfig) -> Option<IpAddr> {
    // Prefer RFC 7239 Forwarded header
    let chain = forwarded_chain(headers);
    let chain = if chain.is_empty() {
        x_forwarded_for_chain(headers)
    } else {
        chain
    };

    select_from_chain(&chain, config)
}

/// `for=` addresses of a Forwarded header, client first
fn forwarded_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    let Some(forwarded) = headers.get("forwarded").and_then(|h| h.to_str().ok()) else {
        return Vec::new();
    };

    // Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43, for="[2001:db8::1]:4711"
    forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let (name, value) = param.trim().split_once('=')?;
                if !name.eq_ignore_ascii_case("for") {
                    return None;
                }
                parse_node(value.trim().trim_matches('"'))
            })
        })
        .collect()
}

/// Parse a Forwarded node: bare address, `a.b.c.d:port` or `[v6]:port`
fn parse_node(node: &str) -> Option<IpAddr> {
    if let Some(rest) = node.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = node.parse::<IpAddr>() {
        return Some(ip);
    }
    node.rsplit_once(':')?.0.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .map(|xff| {
            xff.split(',')
                .filter_map(|s| s.trim().parse::<IpAddr>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Walk the proxy chain right to left, skipping hops we trust
fn select_from_chain(ips: &[IpAddr], config: &GeoConfig) -> Option<IpAddr> {
    if ips.is_empty() {
        return None;
    }

    if let Some(num_trusted) = config.num_trusted_proxies {
        if ips.len() > num_trusted {
            return Some(ips[ips.len() - num_trusted - 1]);
        }
        // Not enough hops in the chain, return the leftmost (least trusted)
        return ips.first().copied();
    }

    if !config.trusted_proxies.is_empty() {
        return ips
            .iter()
            .rev()
            .find(|ip| !is_trusted(**ip, &config.trusted_proxies))
            .or_else(|| ips.first())
            .copied();
    }

    ips.last().copied()
}

fn is_trusted(ip: IpAddr, trusted: &[IpNet]) -> bool {
    trusted.iter().any(|net| net.contains(&ip))
}

/// Whether a geolocation service could say anything about `ip`
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            let unique_local = (first & 0xfe00) == 0xfc00;
            let link_local = (first & 0xffc0) == 0xfe80;
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public(IpAddr::V4(v4));
            }
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

/// Truncate an address to its network prefix
///
/// - IPv4: /24 (zero last octet)
/// - IPv6: /48 (zero last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}
