/* demos/demo.rs */

use clientip::{
    ClientIpResolver, HeaderMap, RangeCategory, RangeLiterals, RangeRegistry, ScanOrder,
    resolve_client_ip, resolve_client_ip_legacy, standard_ranges,
};

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Client IP Resolution Examples ===\n");

    // Example 1: Routable peer address
    example_1_public_peer();

    // Example 2: Chain read in both directions
    example_2_scan_order();

    // Example 3: Only private candidates in headers
    example_3_private_fallback();

    // Example 4: Nothing usable anywhere
    example_4_peer_fallback();

    // Example 5: Legacy behavior
    example_5_legacy();

    // Example 6: Range registry
    example_6_ranges();

    println!("=== All examples completed! ===");
}

fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn example_1_public_peer() {
    println!("Example 1: Routable peer address");

    let headers = headers(&[("x-forwarded-for", "198.51.100.7")]);
    let ip = resolve_client_ip("203.0.113.5", &headers);
    println!("Peer 203.0.113.5 is public, headers ignored: {}", ip);
    println!();
}

fn example_2_scan_order() {
    println!("Example 2: x-forwarded-for read in both directions");

    let headers = headers(&[("x-forwarded-for", "198.51.100.1, 10.0.0.5, 203.0.113.9")]);
    let peer = "10.0.0.1";

    for order in [ScanOrder::LeftToRight, ScanOrder::RightToLeft] {
        let resolver = ClientIpResolver::new().scan_order(order);
        let resolution = resolver.resolve_detailed(peer, &headers);
        println!("{:?}: {} (from {:?})", order, resolution.ip, resolution.source);
    }
    println!();
}

fn example_3_private_fallback() {
    println!("Example 3: Only private candidates in headers");

    let headers = headers(&[
        ("x-forwarded-for", "not-an-ip, 192.168.1.1"),
        ("WL-Proxy-Client-IP", "172.16.0.9"),
    ]);
    let resolution = ClientIpResolver::new().resolve_detailed("10.0.0.1", &headers);
    println!("Second pass result: {} (from {:?})", resolution.ip, resolution.source);
    println!();
}

fn example_4_peer_fallback() {
    println!("Example 4: Nothing usable anywhere");

    let headers = headers(&[("x-forwarded-for", "unknown")]);
    let ip = resolve_client_ip("192.168.0.3", &headers);
    println!("Falling back to the peer address: {}", ip);
    println!();
}

fn example_5_legacy() {
    println!("Example 5: Legacy behavior (no peer short-circuit, right to left)");

    let headers = headers(&[("x-forwarded-for", "198.51.100.1, 198.51.100.2")]);
    println!("Default: {}", resolve_client_ip("203.0.113.5", &headers));
    println!("Legacy:  {}", resolve_client_ip_legacy("203.0.113.5", &headers));
    println!();
}

fn example_6_ranges() {
    println!("Example 6: Range registry");

    let ranges = standard_ranges();
    for category in [
        RangeCategory::Loopback,
        RangeCategory::LinkLocal,
        RangeCategory::Rfc1918,
        RangeCategory::AllPrivate,
    ] {
        let prefixes: Vec<String> = ranges.get(category).iter().map(|p| p.to_string()).collect();
        println!("  {}: {}", category, prefixes.join(", "));
    }

    // Bad literals are logged and dropped, never fatal.
    let literals = RangeLiterals {
        rfc1918: vec!["10.0.0.0/8".to_string(), "10.0.0.0/31".to_string()],
        ..RangeLiterals::default()
    };
    let registry = RangeRegistry::from_literals(&literals);
    for error in registry.rejected() {
        println!("  rejected: {}", error);
    }
    println!();
}
