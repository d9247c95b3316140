/* src/middleware.rs */

use axum::{
    extract::{ConnectInfo, Request},
    http::{Extensions, HeaderMap},
    response::Response,
};
use futures_util::future::BoxFuture;
use std::{
    convert::Infallible,
    net::{Ipv4Addr, SocketAddr},
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::resolver::{ClientIpResolver, HeaderSource, default_resolver};

/// `http` header maps look names up case-insensitively.
impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Extension that holds the resolved client IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    /// Get the IP address as resolved.
    pub fn ip(&self) -> &str {
        &self.0
    }

    /// Parse the resolved address, if it is a plain IPv4 address.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.0.parse().ok()
    }
}

/// Layer for resolving client IP addresses of HTTP requests.
///
/// The peer address comes from `ConnectInfo<SocketAddr>`, so the app must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use clientip::{ClientIp, ClientIpLayer};
///
/// async fn handler(ip: ClientIp) -> String {
///     ip.ip().to_string()
/// }
///
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(ClientIpLayer::default());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientIpLayer {
    resolver: ClientIpResolver,
}

impl ClientIpLayer {
    /// Create a new layer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new layer with a custom resolver.
    pub fn with_resolver(resolver: ClientIpResolver) -> Self {
        Self { resolver }
    }

    /// Create a layer using [`ClientIpResolver::legacy`].
    pub fn legacy() -> Self {
        Self::with_resolver(ClientIpResolver::legacy())
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

/// Service that resolves client IP addresses.
#[derive(Debug, Clone)]
pub struct ClientIpService<S> {
    inner: S,
    resolver: ClientIpResolver,
}

impl<S> Service<Request> for ClientIpService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let ip = resolve_parts(&self.resolver, req.headers(), req.extensions());
        req.extensions_mut().insert(ip);

        let future = self.inner.call(req);
        Box::pin(future)
    }
}

/// Resolve from the connection's peer address, or from headers alone when
/// the connection info is missing. Falls back to `127.0.0.1`.
///
/// IPv4-mapped peers (`::ffff:a.b.c.d`, as seen on dual-stack listeners) are
/// unwrapped to their dotted quad first.
fn resolve_parts(
    resolver: &ClientIpResolver,
    headers: &HeaderMap,
    extensions: &Extensions,
) -> ClientIp {
    let resolved = match extensions.get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => {
            let peer = addr.ip().to_canonical().to_string();
            Some(resolver.resolve(&peer, headers))
        }
        None => resolver.resolve_from_headers(headers),
    };
    ClientIp(resolved.unwrap_or_else(|| Ipv4Addr::LOCALHOST.to_string()))
}

/// Axum extractor for the client IP address.
///
/// Uses the value stored by [`ClientIpLayer`], which is always present when
/// the layer ran. Without the layer it resolves with the default settings.
impl<S> axum::extract::FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        if let Some(client_ip) = parts.extensions.get::<ClientIp>() {
            return Ok(client_ip.clone());
        }

        Ok(resolve_parts(
            default_resolver(),
            &parts.headers,
            &parts.extensions,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    async fn echo(ip: ClientIp) -> String {
        ip.0
    }

    fn request(peer: Option<&str>, headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            builder = builder.extension(ConnectInfo(addr));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn call(app: Router, req: Request) -> String {
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn app(layer: ClientIpLayer) -> Router {
        Router::new().route("/", get(echo)).layer(layer)
    }

    #[tokio::test]
    async fn test_layer_uses_public_peer() {
        let req = request(Some("203.0.113.5:4000"), &[("x-forwarded-for", "8.8.8.8")]);
        assert_eq!(call(app(ClientIpLayer::new()), req).await, "203.0.113.5");
    }

    #[tokio::test]
    async fn test_layer_reads_headers_behind_proxy() {
        let req = request(
            Some("10.0.0.1:4000"),
            &[("X-Forwarded-For", "8.8.8.8, 10.0.0.5")],
        );
        assert_eq!(call(app(ClientIpLayer::new()), req).await, "8.8.8.8");
    }

    #[tokio::test]
    async fn test_legacy_layer() {
        let req = request(
            Some("203.0.113.5:4000"),
            &[("x-forwarded-for", "198.51.100.1, 198.51.100.2")],
        );
        assert_eq!(call(app(ClientIpLayer::legacy()), req).await, "198.51.100.2");
    }

    #[tokio::test]
    async fn test_layer_without_connect_info() {
        let req = request(None, &[("proxy-client-ip", "192.168.3.3")]);
        assert_eq!(call(app(ClientIpLayer::new()), req).await, "192.168.3.3");
    }

    #[tokio::test]
    async fn test_layer_settings_apply_without_connect_info() {
        let layer = ClientIpLayer::with_resolver(ClientIpResolver::new().with_headers(vec![]));
        let req = request(None, &[("x-forwarded-for", "8.8.8.8")]);
        assert_eq!(call(app(layer), req).await, "127.0.0.1");

        let layer = ClientIpLayer::with_resolver(
            ClientIpResolver::new().with_headers(vec!["Proxy-Client-IP".to_string()]),
        );
        let req = request(
            None,
            &[("x-forwarded-for", "8.8.8.8"), ("proxy-client-ip", "198.51.100.3")],
        );
        assert_eq!(call(app(layer), req).await, "198.51.100.3");
    }

    #[tokio::test]
    async fn test_layer_always_stores_client_ip() {
        let layer = ClientIpLayer::with_resolver(ClientIpResolver::new().with_headers(vec![]));
        let app = Router::new()
            .route(
                "/",
                get(|req: Request| async move {
                    req.extensions()
                        .get::<ClientIp>()
                        .map(|ip| ip.0.clone())
                        .unwrap_or_default()
                }),
            )
            .layer(layer);
        let req = request(None, &[("x-forwarded-for", "8.8.8.8")]);
        assert_eq!(call(app, req).await, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_ipv4_mapped_peer_is_unwrapped() {
        let req = request(Some("[::ffff:10.0.0.1]:4000"), &[("x-forwarded-for", "8.8.8.8")]);
        assert_eq!(call(app(ClientIpLayer::new()), req).await, "8.8.8.8");

        let req = request(Some("[::ffff:203.0.113.5]:4000"), &[("x-forwarded-for", "8.8.8.8")]);
        assert_eq!(call(app(ClientIpLayer::new()), req).await, "203.0.113.5");

        // Same unwrapping when the extractor resolves on its own.
        let app = Router::new().route("/", get(echo));
        let req = request(Some("[::ffff:192.168.0.7]:4000"), &[]);
        assert_eq!(call(app, req).await, "192.168.0.7");
    }

    #[tokio::test]
    async fn test_extractor_without_layer() {
        let app = Router::new().route("/", get(echo));

        let req = request(Some("10.0.0.1:4000"), &[("x-forwarded-for", "198.51.100.9")]);
        assert_eq!(call(app.clone(), req).await, "198.51.100.9");

        let req = request(None, &[]);
        assert_eq!(call(app, req).await, "127.0.0.1");
    }

    #[test]
    fn test_client_ip_ipv4() {
        assert_eq!(
            ClientIp("203.0.113.5".to_string()).ipv4(),
            Some(Ipv4Addr::new(203, 0, 113, 5))
        );
        assert_eq!(ClientIp("unknown".to_string()).ipv4(), None);
    }
}
