//! Proxy utility functions.
//!
//! This module contains helper functions for request processing:
//! - Header extraction from Pingora requests
//! - Client IP detection (X-Forwarded-For aware)

use std::collections::HashMap;

use pingora_http::RequestHeader;
use pingora_proxy::Session;

/// Extract headers from Pingora RequestHeader into HashMap.
///
/// Names are lowercased. Headers with non-UTF8 values are skipped.
pub fn extract_headers(req: &RequestHeader) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (name, value) in req.headers.iter() {
        if let Ok(value_str) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), value_str.to_string());
        }
    }
    headers
}

/// First entry of an `X-Forwarded-For` value, if it is non-empty.
pub fn first_forwarded_for(value: &str) -> Option<&str> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

/// Extract client IP address from session.
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` entry wins (the
/// header reads `"client, proxy1, proxy2"`). Otherwise, or when the header is
/// absent, the peer address of the connection is used.
pub fn get_client_ip(session: &Session, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(client_ip) = session
            .req_header()
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(first_forwarded_for)
        {
            return client_ip.to_string();
        }
    }

    session
        .client_addr()
        .and_then(|addr| addr.as_inet().map(|inet| inet.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
