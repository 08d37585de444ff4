//! Client IP resolution for access logs.
//!
//! # Source Priority
//!
//! First match wins:
//!
//! 1. `CF-Connecting-IP`
//! 2. `X-Forwarded-For`
//! 3. `X-Real-IP`
//! 4. The transport peer address (`ConnectInfo<SocketAddr>`)
//!
//! A header only counts when its value is longer than one byte. The chosen
//! value is parsed whole, with surrounding whitespace trimmed, as a single IP
//! literal. A proxy chain such as `"203.0.113.50, 10.0.0.1"` is therefore not
//! a literal and resolves to no address.
//!
//! # Security Warning
//!
//! **These headers are client-controlled.** The resolved address is a
//! diagnostic field in a log record, nothing more. Do not feed it into access
//! control unless the service sits behind a proxy that overwrites them.
//!
//! # The "unknown" Fallback
//!
//! Resolution never fails the request. Malformed values, and requests that
//! carry neither a usable header nor `ConnectInfo`, resolve to `None`, which
//! is logged as [`UNKNOWN_IP`].
//!
//! # Internal Architecture
//!
//! ```text
//!     ┌───────────────────────────┐
//!     │  extract_ip_candidate     │ ← Private, returns IpCandidate<'a>
//!     │  (no allocations)         │
//!     └─────────────┬─────────────┘
//!                   │
//!                   ▼
//!     ┌───────────────────────────┐
//!     │  client_ip                │ → Option<IpAddr>
//!     └─────────────┬─────────────┘
//!                   │
//!                   ▼
//!     ┌───────────────────────────┐
//!     │  client_ip_string         │ → Cow<'static, str>
//!     └───────────────────────────┘
//! ```

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::debug;

/// Logged in place of an address that could not be resolved.
pub const UNKNOWN_IP: &str = "unknown";

pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Headers consulted, in priority order.
const IP_HEADERS: [&str; 3] = [CF_CONNECTING_IP, X_FORWARDED_FOR, X_REAL_IP];

// =============================================================================
// Private Helper
// =============================================================================

/// Where the client address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpCandidate<'a> {
    /// Raw value of one of [`IP_HEADERS`].
    Header(&'static str, &'a [u8]),
    /// Peer address of the accepted connection.
    Peer(SocketAddr),
    NotFound,
}

#[inline]
fn extract_ip_candidate<B>(req: &Request<B>) -> IpCandidate<'_> {
    for name in IP_HEADERS {
        if let Some(value) = req.headers().get(name)
            && value.len() > 1
        {
            return IpCandidate::Header(name, value.as_bytes());
        }
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => IpCandidate::Peer(*addr),
        None => IpCandidate::NotFound,
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Resolve the client address of `req`.
///
/// Returns `None` when the winning header does not hold a valid IP literal, or
/// when there is no header and no peer address.
pub fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    match extract_ip_candidate(req) {
        IpCandidate::Header(name, raw) => {
            let parsed = std::str::from_utf8(raw)
                .ok()
                .and_then(|value| value.trim().parse::<IpAddr>().ok());
            if parsed.is_none() {
                debug!(
                    header = name,
                    value = %String::from_utf8_lossy(raw),
                    "Malformed client IP header"
                );
            }
            parsed
        }
        IpCandidate::Peer(addr) => Some(addr.ip()),
        IpCandidate::NotFound => None,
    }
}

/// [`client_ip`] rendered for a log record.
///
/// `Cow<'static, str>`: borrowed for the "unknown" fallback, owned otherwise.
#[inline]
pub fn client_ip_string<B>(req: &Request<B>) -> Cow<'static, str> {
    match client_ip(req) {
        Some(ip) => Cow::Owned(ip.to_string()),
        None => Cow::Borrowed(UNKNOWN_IP),
    }
}
