/* demos/axum.rs */

use axum::{
    Router,
    extract::ConnectInfo,
    http::HeaderMap,
    response::Json,
    routing::get,
};
use clientip::{ClientIp, ClientIpLayer, ClientIpResolver, DEFAULT_HEADERS, ScanOrder, is_private};
use serde_json::json;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = create_app();
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    println!("Server starting on http://localhost:3000");
    println!("Test endpoints:");
    println!("  • GET /ip            - Client IP, chains read left to right");
    println!("  • GET /nearest/ip    - Client IP, chains read right to left");
    println!("  • GET /legacy/ip     - Client IP, legacy resolution");
    println!("  • GET /debug         - How the address was resolved");
    println!();
    println!("Test with headers (from a private address such as 127.0.0.1):");
    println!("  curl -H 'X-Forwarded-For: 198.51.100.1, 192.168.1.1' http://localhost:3000/ip");
    println!("  curl -H 'X-Forwarded-For: 198.51.100.1, 203.0.113.9' http://localhost:3000/nearest/ip");
    println!("  curl -H 'Proxy-Client-IP: 192.168.1.20' http://localhost:3000/debug");
    println!();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

fn create_app() -> Router {
    let default_router = Router::new()
        .route("/ip", get(ip_handler))
        .layer(ClientIpLayer::default());

    let nearest_layer = ClientIpLayer::with_resolver(
        ClientIpResolver::new().scan_order(ScanOrder::RightToLeft),
    );
    let nearest_router = Router::new()
        .route("/ip", get(ip_handler))
        .layer(nearest_layer);

    let legacy_router = Router::new()
        .route("/ip", get(ip_handler))
        .layer(ClientIpLayer::legacy());

    Router::new()
        .merge(default_router)
        .nest("/nearest", nearest_router)
        .nest("/legacy", legacy_router)
        .route("/debug", get(debug_handler))
}

/// Handler that returns the resolved address in JSON format
async fn ip_handler(client_ip: ClientIp) -> Json<serde_json::Value> {
    Json(json!({
        "client_ip": client_ip.ip(),
        "is_private": is_private(client_ip.ip()),
    }))
}

/// Debug handler showing where the address came from
async fn debug_handler(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let resolution = ClientIpResolver::new().resolve_detailed(&addr.ip().to_string(), &headers);

    let proxy_headers: std::collections::HashMap<&str, &str> = DEFAULT_HEADERS
        .iter()
        .filter_map(|name| {
            headers
                .get(*name)
                .and_then(|value| value.to_str().ok())
                .map(|value| (*name, value))
        })
        .collect();

    Json(json!({
        "client_ip": resolution.ip,
        "source": format!("{:?}", resolution.source),
        "connection_info": {
            "remote_addr": addr.to_string(),
            "remote_ip": addr.ip().to_string(),
            "remote_ip_is_private": is_private(&addr.ip().to_string()),
        },
        "proxy_headers": proxy_headers,
    }))
}
