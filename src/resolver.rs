/* src/resolver.rs */

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use tracing::trace;

use crate::codec;
use crate::range::{RangeLiterals, RangeRegistry, RangeSet, standard_ranges};

/// Type alias for header maps. Lookups are by exact, case-sensitive name.
pub type HeaderMap = HashMap<String, String>;

/// Proxy-chain headers consulted by default, in priority order.
pub const DEFAULT_HEADERS: [&str; 3] =
    ["x-forwarded-for", "Proxy-Client-IP", "WL-Proxy-Client-IP"];

/// Lookup of raw request header values by name.
pub trait HeaderSource {
    /// Raw value of the header `name`, if present.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl HeaderSource for HashMap<&str, &str> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).copied()
    }
}

impl HeaderSource for [(&str, &str)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter().find(|(key, _)| *key == name).map(|(_, value)| *value)
    }
}

impl<const N: usize> HeaderSource for [(&str, &str); N] {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

impl<T: HeaderSource + ?Sized> HeaderSource for &T {
    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }
}

/// An inbound request: its direct peer address plus its headers.
pub trait ClientRequest: HeaderSource {
    /// Network-layer source address of the connection.
    fn remote_addr(&self) -> Cow<'_, str>;
}

/// Owned request data, handy when the caller has no request type of its own.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub remote_addr: String,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl HeaderSource for RequestInfo {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.header(name)
    }
}

impl ClientRequest for RequestInfo {
    fn remote_addr(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.remote_addr)
    }
}

/// Direction in which a comma-separated proxy chain is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ScanOrder {
    /// Client-closest hop first.
    #[default]
    LeftToRight,
    /// Server-closest hop first.
    RightToLeft,
}

/// Where a resolved address came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    /// The peer address is routable and was returned without reading headers.
    Peer,
    /// Taken from a proxy-chain header.
    Header {
        name: String,
        /// Set when the first pass found nothing and private addresses were
        /// accepted.
        private_allowed: bool,
    },
    /// No header produced a candidate; the peer address was echoed back.
    Fallback,
}

/// A resolved client address and its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub ip: String,
    pub source: ResolutionSource,
}

/// Plain-data resolver settings, loadable from configuration files with the
/// `serde` feature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct ResolverConfig {
    pub headers: Vec<String>,
    pub scan_order: ScanOrder,
    pub peer_short_circuit: bool,
    /// Replaces the compiled-in private ranges when set.
    pub ranges: Option<RangeLiterals>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            headers: DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect(),
            scan_order: ScanOrder::default(),
            peer_short_circuit: true,
            ranges: None,
        }
    }
}

/// Configuration for client IP resolution.
#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    /// Headers to check, in order of preference.
    pub headers: Vec<String>,
    /// Direction in which each header's chain is read.
    pub scan_order: ScanOrder,
    /// Return a routable peer address without consulting headers.
    pub peer_short_circuit: bool,
    private_ranges: Arc<RangeSet>,
}

impl Default for ClientIpResolver {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl ClientIpResolver {
    /// Create a resolver with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// The older behavior: headers are always consulted and chains are read
    /// right to left.
    pub fn legacy() -> Self {
        Self::default()
            .peer_short_circuit(false)
            .scan_order(ScanOrder::RightToLeft)
    }

    /// Build a resolver from plain settings.
    pub fn from_config(config: &ResolverConfig) -> Self {
        let private_ranges = match &config.ranges {
            Some(literals) => RangeRegistry::from_literals(literals).all_private().clone(),
            None => standard_ranges().all_private().clone(),
        };
        Self {
            headers: config.headers.clone(),
            scan_order: config.scan_order,
            peer_short_circuit: config.peer_short_circuit,
            private_ranges,
        }
    }

    /// Set headers to check.
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the direction in which proxy chains are read.
    pub fn scan_order(mut self, order: ScanOrder) -> Self {
        self.scan_order = order;
        self
    }

    /// Set whether a routable peer address is returned without reading
    /// headers.
    pub fn peer_short_circuit(mut self, enabled: bool) -> Self {
        self.peer_short_circuit = enabled;
        self
    }

    /// Use a custom set of non-routable ranges.
    pub fn with_private_ranges(mut self, ranges: Arc<RangeSet>) -> Self {
        self.private_ranges = ranges;
        self
    }

    pub fn private_ranges(&self) -> &Arc<RangeSet> {
        &self.private_ranges
    }

    /// Resolve the client address of a request.
    pub fn resolve_request<R: ClientRequest + ?Sized>(&self, request: &R) -> String {
        let peer = request.remote_addr();
        self.resolve(&peer, request)
    }

    /// Resolve the client address from a peer address and request headers.
    ///
    /// Never fails: when nothing better is found the trimmed peer address is
    /// returned.
    pub fn resolve<H: HeaderSource + ?Sized>(&self, peer: &str, headers: &H) -> String {
        self.resolve_detailed(peer, headers).ip
    }

    /// Like [`resolve`](Self::resolve), also reporting where the address came
    /// from.
    pub fn resolve_detailed<H: HeaderSource + ?Sized>(
        &self,
        peer: &str,
        headers: &H,
    ) -> Resolution {
        let peer = peer.trim();

        if self.peer_short_circuit && !self.private_ranges.contains(peer) {
            trace!(peer, "Peer address is routable, skipping proxy headers");
            return Resolution {
                ip: peer.to_string(),
                source: ResolutionSource::Peer,
            };
        }

        if let Some(resolution) = self.scan_headers(headers) {
            return resolution;
        }

        trace!(peer, "No usable proxy header, falling back to peer address");
        Resolution {
            ip: peer.to_string(),
            source: ResolutionSource::Fallback,
        }
    }

    /// Resolve from headers alone, ignoring the peer address.
    pub fn resolve_from_headers<H: HeaderSource + ?Sized>(&self, headers: &H) -> Option<String> {
        self.scan_headers(headers).map(|resolution| resolution.ip)
    }

    /// Two passes over the headers: routable candidates first, then any valid
    /// address.
    fn scan_headers<H: HeaderSource + ?Sized>(&self, headers: &H) -> Option<Resolution> {
        for private_allowed in [false, true] {
            for name in &self.headers {
                let Some(value) = headers.header(name) else {
                    continue;
                };
                if let Some(ip) = self.parse_header_value(value, private_allowed) {
                    trace!(header = %name, ip, private_allowed, "Resolved client address from header");
                    return Some(Resolution {
                        ip: ip.to_string(),
                        source: ResolutionSource::Header {
                            name: name.clone(),
                            private_allowed,
                        },
                    });
                }
            }
        }
        None
    }

    /// Pick the first acceptable address from a comma-separated chain.
    fn parse_header_value<'v>(&self, value: &'v str, private_allowed: bool) -> Option<&'v str> {
        let tokens = value.split(',').map(str::trim);
        let mut candidates: Box<dyn Iterator<Item = &'v str> + 'v> = match self.scan_order {
            ScanOrder::LeftToRight => Box::new(tokens),
            ScanOrder::RightToLeft => Box::new(tokens.rev()),
        };

        candidates.find(|ip| {
            codec::is_valid_ipv4(ip) && (private_allowed || !self.private_ranges.contains(ip))
        })
    }
}

impl From<&ResolverConfig> for ClientIpResolver {
    fn from(config: &ResolverConfig) -> Self {
        Self::from_config(config)
    }
}

static DEFAULT_RESOLVER: LazyLock<ClientIpResolver> = LazyLock::new(ClientIpResolver::default);
static RIGHT_TO_LEFT_RESOLVER: LazyLock<ClientIpResolver> =
    LazyLock::new(|| ClientIpResolver::default().scan_order(ScanOrder::RightToLeft));
static LEGACY_RESOLVER: LazyLock<ClientIpResolver> = LazyLock::new(ClientIpResolver::legacy);

/// Shared resolver with the default configuration.
pub fn default_resolver() -> &'static ClientIpResolver {
    &DEFAULT_RESOLVER
}

/// Resolve the client address with the default configuration.
///
/// # Examples
///
/// ```rust
/// use clientip::{resolve_client_ip, HeaderMap};
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-forwarded-for".to_string(), "198.51.100.7, 10.0.0.5".to_string());
///
/// // A private peer means the request came through a proxy.
/// assert_eq!(resolve_client_ip("10.0.0.1", &headers), "198.51.100.7");
/// // A routable peer is trusted as is.
/// assert_eq!(resolve_client_ip("203.0.113.5", &headers), "203.0.113.5");
/// ```
pub fn resolve_client_ip<H: HeaderSource + ?Sized>(peer: &str, headers: &H) -> String {
    DEFAULT_RESOLVER.resolve(peer, headers)
}

/// Resolve with the default configuration and an explicit chain direction.
pub fn resolve_client_ip_with_order<H: HeaderSource + ?Sized>(
    peer: &str,
    headers: &H,
    order: ScanOrder,
) -> String {
    match order {
        ScanOrder::LeftToRight => DEFAULT_RESOLVER.resolve(peer, headers),
        ScanOrder::RightToLeft => RIGHT_TO_LEFT_RESOLVER.resolve(peer, headers),
    }
}

/// Resolve with [`ClientIpResolver::legacy`].
pub fn resolve_client_ip_legacy<H: HeaderSource + ?Sized>(peer: &str, headers: &H) -> String {
    LEGACY_RESOLVER.resolve(peer, headers)
}
