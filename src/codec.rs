/* src/codec.rs */

//! Dotted-quad parsing and the 32-character binary form used for prefix
//! matching.

/// Number of dot-separated octets in an IPv4 address.
const OCTETS: usize = 4;

/// Split `s` into exactly four octets, each a base-10 integer in `0..=255`.
///
/// An optional sign is accepted as long as the value stays in range, so
/// `"+10"` and `"-0"` both parse. No whitespace is trimmed.
fn octets(s: &str) -> Option<[u8; OCTETS]> {
    let mut out = [0u8; OCTETS];
    let mut parts = s.split('.');
    for slot in out.iter_mut() {
        let n: i32 = parts.next()?.parse().ok()?;
        *slot = u8::try_from(n).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Check whether `s` is a syntactically valid IPv4 address.
///
/// Network and broadcast addresses count as valid.
pub fn is_valid_ipv4(s: &str) -> bool {
    octets(s).is_some()
}

/// Encode a dotted quad as 32 binary digits, 8 per octet in address order.
///
/// # Examples
///
/// ```rust
/// use clientip::codec::to_binary;
///
/// assert_eq!(
///     to_binary("10.0.0.5").as_deref(),
///     Some("00001010000000000000000000000101")
/// );
/// assert_eq!(to_binary("10.0.0"), None);
/// ```
pub fn to_binary(s: &str) -> Option<String> {
    let octets = octets(s)?;
    let mut bits = String::with_capacity(OCTETS * 8);
    for octet in octets {
        bits.push_str(&format!("{octet:08b}"));
    }
    Some(bits)
}

/// Decode 32 binary digits back into a canonical dotted quad.
pub fn from_binary(bits: &str) -> Option<String> {
    if bits.len() != OCTETS * 8 || !bits.bytes().all(|b| b == b'0' || b == b'1') {
        return None;
    }
    let mut octets = Vec::with_capacity(OCTETS);
    for chunk in bits.as_bytes().chunks(8) {
        let chunk = std::str::from_utf8(chunk).ok()?;
        octets.push(u8::from_str_radix(chunk, 2).ok()?.to_string());
    }
    Some(octets.join("."))
}

/// Numeric form of a valid dotted quad.
pub fn to_u32(s: &str) -> Option<u32> {
    octets(s).map(u32::from_be_bytes)
}

/// Pad a partial address with `.0` groups until it has four of them.
///
/// `"172.18.60"` becomes `"172.18.60.0"`. Only meant for building CIDR
/// heads out of static literals; the result is not re-validated.
pub fn fill_partial_address(s: &str) -> String {
    let mut filled = s.trim().to_string();
    let groups = filled.split('.').count();
    for _ in groups..OCTETS {
        filled.push_str(".0");
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        assert!(is_valid_ipv4("192.168.1.1"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(is_valid_ipv4("255.255.255.255"));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(!is_valid_ipv4("192.168.1.256"));
        assert!(!is_valid_ipv4("1.2.3"));
        assert!(!is_valid_ipv4("1.2.3.4.5"));
        assert!(!is_valid_ipv4(""));
        assert!(!is_valid_ipv4("a.b.c.d"));
        assert!(!is_valid_ipv4("1.2.3.-1"));
        assert!(!is_valid_ipv4(" 1.2.3.4"));
        assert!(!is_valid_ipv4("1..2.3"));
        assert!(!is_valid_ipv4("unknown"));
    }

    #[test]
    fn test_empty_trailing_group_is_invalid() {
        assert!(!is_valid_ipv4("1.2.3.4."));
        assert!(!is_valid_ipv4("1.2.3.4.."));
        assert!(!is_valid_ipv4(".1.2.3.4"));
        assert_eq!(to_binary("1.2.3.4."), None);
    }

    #[test]
    fn test_signed_octets_in_range_are_accepted() {
        assert!(is_valid_ipv4("+10.0.0.1"));
        assert!(is_valid_ipv4("10.-0.0.1"));
        assert_eq!(to_u32("+10.0.0.1"), to_u32("10.0.0.1"));
    }

    #[test]
    fn test_binary_extremes() {
        assert_eq!(to_binary("0.0.0.0"), Some("0".repeat(32)));
        assert_eq!(to_binary("255.255.255.255"), Some("1".repeat(32)));
        assert_eq!(to_binary("256.0.0.0"), None);
    }

    #[test]
    fn test_binary_octet_padding() {
        assert_eq!(
            to_binary("5.128.1.0").as_deref(),
            Some("00000101100000000000000100000000")
        );
    }

    #[test]
    fn test_binary_decodes_back() {
        for ip in ["8.8.8.8", "172.31.255.254", "127.0.0.1", "203.0.113.5"] {
            let bits = to_binary(ip).unwrap();
            assert_eq!(from_binary(&bits).as_deref(), Some(ip));
        }
    }

    #[test]
    fn test_every_octet_value_decodes_back_in_each_position() {
        for position in 0..4 {
            for value in 0..=255u8 {
                let mut octets = [1u8, 2, 3, 4];
                octets[position] = value;
                let ip = octets.map(|o| o.to_string()).join(".");

                let bits = to_binary(&ip).unwrap();
                assert_eq!(bits.len(), 32);
                assert_eq!(from_binary(&bits).as_deref(), Some(ip.as_str()));
            }
        }
    }

    #[test]
    fn test_from_binary_rejects_garbage() {
        assert_eq!(from_binary("0101"), None);
        assert_eq!(from_binary(&"2".repeat(32)), None);
        assert_eq!(from_binary(&format!("+{}", "0".repeat(31))), None);
    }

    #[test]
    fn test_to_u32() {
        assert_eq!(to_u32("10.0.0.1"), Some(0x0a00_0001));
        assert_eq!(to_u32("255.255.255.255"), Some(u32::MAX));
        assert_eq!(to_u32("10.0.0"), None);
    }

    #[test]
    fn test_fill_partial_address() {
        assert_eq!(fill_partial_address("172.18.60"), "172.18.60.0");
        assert_eq!(fill_partial_address("10"), "10.0.0.0");
        assert_eq!(fill_partial_address(" 192.168 "), "192.168.0.0");
        assert_eq!(fill_partial_address("1.2.3.4"), "1.2.3.4");
        assert_eq!(fill_partial_address("1.2.3.4.5"), "1.2.3.4.5");
    }
}
