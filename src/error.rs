/* src/error.rs */

use thiserror::Error;

/// Result type alias for operations that may fail with `ClientIpError`.
pub type Result<T> = std::result::Result<T, ClientIpError>;

/// Errors raised while validating addresses and range literals.
///
/// Client IP resolution itself never fails; these only surface through the
/// validating constructors and the registry's rejection report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientIpError {
    /// Invalid IPv4 address format.
    #[error("Invalid IPv4 address format: {0}")]
    InvalidAddress(String),

    /// The part after `/` is not an integer.
    #[error("Invalid CIDR prefix length in literal: {0}")]
    InvalidPrefixLength(String),

    /// The prefix length parsed but lies outside `1..=30`.
    #[error("CIDR prefix length {length} outside 1..=30 in literal: {literal}")]
    PrefixLengthOutOfRange { literal: String, length: i32 },
}
