//! Caller identity resolution.
//!
//! Every request is attributed to a caller before it is counted. The default
//! resolver uses the raw `authorization` header value when present and falls
//! back to the client address reported by the proxy in front of us.

use axum::http::HeaderMap;
use std::fmt;

/// Sentinel identity used when a request carries no usable header.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Where a caller identity was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentitySource {
    /// The `authorization` header, used verbatim
    Credential,
    /// The `x-forwarded-for` header
    ForwardedFor,
    /// The `x-real-ip` header
    RealIp,
    /// Nothing usable was present
    Unknown,
    /// Supplied by a custom resolver
    Custom,
}

/// The key a request is counted under.
///
/// The value is kept as the raw header bytes, so credentials that are not
/// valid UTF-8 still map to distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
    source: IdentitySource,
    value: Vec<u8>,
}

impl CallerIdentity {
    pub fn new(source: IdentitySource, value: impl Into<Vec<u8>>) -> Self {
        Self {
            source,
            value: value.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(IdentitySource::Unknown, UNKNOWN_IDENTITY)
    }

    /// Resolve an identity from request headers.
    ///
    /// Empty header values are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let candidates = [
            ("authorization", IdentitySource::Credential),
            ("x-forwarded-for", IdentitySource::ForwardedFor),
            ("x-real-ip", IdentitySource::RealIp),
        ];

        candidates
            .into_iter()
            .find_map(|(name, source)| {
                header_value(headers, name).map(|value| Self::new(source, value))
            })
            .unwrap_or_else(Self::unknown)
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }

    /// The raw key value. May be a bearer credential, do not log it.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            IdentitySource::Credential => write!(f, "credential:<redacted>"),
            _ => write!(f, "{}", String::from_utf8_lossy(&self.value)),
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<Vec<u8>> {
    let value = headers.get(name)?.as_bytes();
    if value.is_empty() {
        None
    } else {
        Some(value.to_vec())
    }
}

/// Strategy for turning request headers into a caller identity.
///
/// Deployments that can decode credentials into a stable subject id plug in
/// their own implementation here.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> CallerIdentity;
}

/// Header-based resolver: authorization, then forwarded-for, then real-ip.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentityResolver;

impl IdentityResolver for HeaderIdentityResolver {
    fn resolve(&self, headers: &HeaderMap) -> CallerIdentity {
        CallerIdentity::from_headers(headers)
    }
}
