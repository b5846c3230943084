use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use core::convert::Infallible;
use std::net::SocketAddr;

/// Best-effort address of the original caller.
///
/// Behind a load balancer the peer address is the balancer itself, so the
/// first hop of `X-Forwarded-For` wins, then `X-Real-IP`, then the socket
/// peer. Falls back to `"unknown"` when none is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(Self(
            forwarded_for(&parts.headers)
                .or(peer)
                .unwrap_or_else(|| String::from("unknown")),
        ))
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let first_hop = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    first_hop
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> String {
        let (mut parts, ()) = request.into_parts();
        let ClientAddr(addr) = ClientAddr::from_request_parts(&mut parts, &()).await.unwrap();
        addr
    }

    #[tokio::test]
    async fn forwarded_for_first_hop_wins() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.2, 10.0.0.1")
            .header("x-real-ip", "10.0.0.9")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, "203.0.113.7");
    }

    #[tokio::test]
    async fn real_ip_when_no_forwarded_for() {
        let request = Request::builder()
            .header("x-real-ip", " 198.51.100.23 ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, "198.51.100.23");
    }

    #[tokio::test]
    async fn peer_address_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 54321))));
        assert_eq!(extract(request).await, "192.0.2.1");
    }

    #[tokio::test]
    async fn unknown_without_any_source() {
        let request = Request::builder()
            .header("x-forwarded-for", "  ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, "unknown");
    }
}
