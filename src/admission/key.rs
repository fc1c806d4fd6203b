//! Caller identity for admission control.
//!
//! # Responsibilities
//! - Derive a stable key from request metadata
//! - Normalize client addresses so one host maps to one key
//! - Fall back to a sentinel key instead of failing

use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use axum::{body::Body, extract::ConnectInfo, http::Request};

use crate::config::KeyExtractionConfig;

/// Header consulted when forwarded addresses are trusted.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

const ANONYMOUS: &str = "anonymous";

/// Opaque identifier used to bucket admission state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    /// Key shared by every request whose caller could not be identified.
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS)
    }

    pub fn is_anonymous(&self) -> bool {
        &*self.0 == ANONYMOUS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<IpAddr> for Key {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip.to_string())
    }
}

/// Derives an admission key from a request. Must be pure and infallible.
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, request: &Request<Body>) -> Key;
}

/// Keys requests by client IP address.
#[derive(Debug, Clone)]
pub struct ClientIpExtractor {
    trust_forwarded_for: bool,
    ipv6_prefix_len: u8,
}

impl ClientIpExtractor {
    pub fn new(trust_forwarded_for: bool, ipv6_prefix_len: u8) -> Self {
        Self {
            trust_forwarded_for,
            ipv6_prefix_len: ipv6_prefix_len.min(128),
        }
    }

    pub fn from_config(config: &KeyExtractionConfig) -> Self {
        Self::new(config.trust_forwarded_for, config.ipv6_prefix_len)
    }

    fn forwarded_ip(request: &Request<Body>) -> Option<IpAddr> {
        let value = request.headers().get(X_FORWARDED_FOR)?.to_str().ok()?;
        value.split(',').next()?.trim().parse().ok()
    }

    fn peer_ip(request: &Request<Body>) -> Option<IpAddr> {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }

    /// Canonical form of an address: IPv4-mapped IPv6 becomes IPv4 and IPv6
    /// is masked down to its network prefix.
    pub fn normalize(&self, ip: IpAddr) -> Key {
        match ip.to_canonical() {
            IpAddr::V4(v4) => Key::new(v4.to_string()),
            IpAddr::V6(v6) if self.ipv6_prefix_len >= 128 => Key::new(v6.to_string()),
            IpAddr::V6(v6) => {
                let mask = match self.ipv6_prefix_len {
                    0 => 0,
                    len => u128::MAX << (128 - u32::from(len)),
                };
                let network = Ipv6Addr::from(u128::from(v6) & mask);
                Key::new(format!("{}/{}", network, self.ipv6_prefix_len))
            }
        }
    }
}

impl Default for ClientIpExtractor {
    fn default() -> Self {
        Self::new(false, 64)
    }
}

impl KeyExtractor for ClientIpExtractor {
    fn extract(&self, request: &Request<Body>) -> Key {
        let forwarded = if self.trust_forwarded_for {
            Self::forwarded_ip(request)
        } else {
            None
        };

        match forwarded.or_else(|| Self::peer_ip(request)) {
            Some(ip) => self.normalize(ip),
            None => {
                tracing::debug!(uri = %request.uri(), "No client address available, using anonymous key");
                Key::anonymous()
            }
        }
    }
}
