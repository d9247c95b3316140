/* src/lib.rs */
//! # Client IP Resolver
//!
//! Determine the IPv4 address that best represents the client behind a chain
//! of proxies, from the connection's peer address and the proxy-chain headers
//! `x-forwarded-for`, `Proxy-Client-IP` and `WL-Proxy-Client-IP`.
//!
//! ## Features
//!
//! - Routable peer addresses are returned as is; private ones trigger a
//!   header scan
//! - Header chains read left to right or right to left
//! - Two-pass scan: routable candidates first, then any valid address
//! - CIDR range sets for loopback, link-local and RFC 1918 blocks
//! - Optional Axum middleware and extractor integration via the `axum` feature
//! - Optional `serde` support for the configuration types
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use clientip::{ClientIpResolver, HeaderMap, ScanOrder};
//!
//! let mut headers = HeaderMap::new();
//! headers.insert("x-forwarded-for".to_string(), "8.8.8.8, 10.0.0.5".to_string());
//!
//! let resolver = ClientIpResolver::new().scan_order(ScanOrder::RightToLeft);
//! // 10.0.0.5 is skipped because it is private.
//! assert_eq!(resolver.resolve("10.0.0.1", &headers), "8.8.8.8");
//! ```
//!
//! ### Range Membership
//!
//! ```rust
//! use clientip::{RangeCategory, standard_ranges};
//!
//! let ranges = standard_ranges();
//! assert!(ranges.is_member(RangeCategory::Rfc1918, "172.20.1.1"));
//! assert!(ranges.is_member(RangeCategory::Loopback, "127.255.255.255"));
//! assert!(!ranges.is_member(RangeCategory::AllPrivate, "203.0.113.5"));
//! ```

pub mod codec;
pub mod error;
pub mod range;
pub mod resolver;

#[cfg(feature = "axum")]
pub mod middleware;

pub use error::{ClientIpError, Result};
pub use range::{
    CidrPrefix, RangeCategory, RangeLiterals, RangeRegistry, RangeSet, is_private, standard_ranges,
};
pub use resolver::{
    ClientIpResolver, ClientRequest, DEFAULT_HEADERS, HeaderMap, HeaderSource, RequestInfo,
    Resolution, ResolutionSource, ResolverConfig, ScanOrder, default_resolver, resolve_client_ip,
    resolve_client_ip_legacy, resolve_client_ip_with_order,
};

#[cfg(feature = "axum")]
pub use middleware::{ClientIp, ClientIpLayer, ClientIpService};
