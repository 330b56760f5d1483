//! Reverse proxy to the loopback backend.
//!
//! Bodies stream through in both directions without buffering and without a
//! size cap; large downloads and uploads pass straight through. The client's
//! `Host` is kept, forwarding headers are added, hop-by-hop headers dropped.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::GateError;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Headers that only describe one hop and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// The backend the gate forwards allowed requests to.
#[derive(Clone)]
pub struct Upstream {
    addr: SocketAddr,
    client: Client<HttpConnector, Body>,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream").field("addr", &self.addr).finish()
    }
}

impl Upstream {
    pub fn new(addr: SocketAddr) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { addr, client }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Forward `req` from `client_addr` and stream the backend's response back.
    pub async fn forward(&self, mut req: Request, client_addr: SocketAddr) -> Result<Response, GateError> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();
        *req.uri_mut() = Uri::builder()
            .scheme("http")
            .authority(self.addr.to_string())
            .path_and_query(path_and_query)
            .build()?;

        strip_hop_by_hop(req.headers_mut());
        add_forwarding_headers(req.headers_mut(), client_addr);

        let mut resp = self.client.request(req).await?;
        strip_hop_by_hop(resp.headers_mut());
        Ok(resp.map(Body::new))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are hop-by-hop too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Append the client to `X-Forwarded-For`, set `X-Real-IP`, and forward the
/// scheme. The gate itself only speaks plain HTTP, so an incoming
/// `X-Forwarded-Proto` from a TLS terminator in front is kept as is.
pub fn add_forwarding_headers(headers: &mut HeaderMap, client_addr: SocketAddr) {
    let ip = client_addr.ip().to_string();

    let chain = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .chain(std::iter::once(ip.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(&ip) {
        headers.insert(X_REAL_IP, value);
    }
    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SocketAddr {
        "203.0.113.9:40000".parse().unwrap()
    }

    #[test]
    fn forwarded_for_is_created() {
        let mut headers = HeaderMap::new();
        add_forwarding_headers(&mut headers, client());
        assert_eq!(headers[&X_FORWARDED_FOR], "203.0.113.9");
        assert_eq!(headers[&X_REAL_IP], "203.0.113.9");
        assert_eq!(headers[&X_FORWARDED_PROTO], "http");
    }

    #[test]
    fn forwarded_for_is_appended() {
        let mut headers = HeaderMap::new();
        headers.append(X_FORWARDED_FOR, "198.51.100.1".parse().unwrap());
        headers.append(X_FORWARDED_FOR, "198.51.100.2".parse().unwrap());
        headers.insert(X_FORWARDED_PROTO, "https".parse().unwrap());
        add_forwarding_headers(&mut headers, client());
        assert_eq!(
            headers[&X_FORWARDED_FOR],
            "198.51.100.1, 198.51.100.2, 203.0.113.9"
        );
        assert_eq!(headers.get_all(&X_FORWARDED_FOR).iter().count(), 1);
        assert_eq!(headers[&X_FORWARDED_PROTO], "https");
    }

    #[test]
    fn hop_by_hop_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive, x-custom-hop".parse().unwrap());
        headers.insert("x-custom-hop", "1".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::HOST, "files.example.com".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer backend-token".parse().unwrap());
        strip_hop_by_hop(&mut headers);
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-custom-hop").is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        // End-to-end headers survive, credentials included.
        assert_eq!(headers[header::HOST], "files.example.com");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer backend-token");
    }
}
