//! This module contains all the routers' middlewares
//!
use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use primitives::util::ip::ip_to_i64;

#[cfg(test)]
pub use test_util::*;

pub mod auth;

pub const DEVICE_IP: &str = "device-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// The IP address of the device which made the request, empty if unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    /// The dotted quad as an integer, `0` for anything but IPv4.
    pub fn as_i64(&self) -> i64 {
        ip_to_i64(&self.0)
    }
}

/// Adds the [`ClientIp`] to the request extensions.
pub async fn client_ip<B>(mut request: Request<B>, next: Next<B>) -> Response {
    let ip = request_ip(&request).unwrap_or_default();
    request.extensions_mut().insert(ClientIp(ip));

    next.run(request).await
}

/// Get's the Request IP from either `Device-Ip`, the first IP of `X-Forwarded-For`
/// or `X-Real-Ip` and falls back to the address of the connection.
fn request_ip<B>(request: &Request<B>) -> Option<String> {
    let headers = request.headers();

    header_value(headers, DEVICE_IP)
        .or_else(|| {
            header_value(headers, X_FORWARDED_FOR)
                .and_then(|ips| ips.split(',').next())
                .map(str::trim)
                // filter out empty IP
                .filter(|ip| !ip.is_empty())
        })
        .or_else(|| header_value(headers, X_REAL_IP))
        .map(ToString::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(socket_addr)| socket_addr.ip().to_string())
        })
}

/// A non-empty header value.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
