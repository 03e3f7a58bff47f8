//! Result responder.
//!
//! Handlers return an [`EndpointResponse`] instead of writing to the session
//! directly. This keeps every handler testable without a Pingora session;
//! the proxy writes the response in one place.
//!
//! Three shapes exist and each endpoint uses exactly one of them:
//! binary payloads, 302 redirects and the JSON envelope
//! `{status, creator, result | error, allowed?}`.

use bytes::Bytes;
use serde_json::{json, Value};

use crate::constants::IMMUTABLE_CACHE_CONTROL;
use crate::error::GatewayError;

pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    (
        "Access-Control-Allow-Headers",
        "Authorization, Content-Type, X-Admin-Secret, X-User-Id",
    ),
    ("Access-Control-Expose-Headers", "X-Result-ID, X-Result-URL"),
];

/// Cache policy for binary responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Fresh generation; never cached
    NoStore,
    /// Retrieval by id; content never changes
    Immutable,
}

impl CachePolicy {
    pub fn header_value(&self) -> &'static str {
        match self {
            CachePolicy::NoStore => "no-store",
            CachePolicy::Immutable => IMMUTABLE_CACHE_CONTROL,
        }
    }
}

/// Response produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl EndpointResponse {
    pub fn new(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    fn with_cors(mut self) -> Self {
        for (name, value) in CORS_HEADERS {
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Body parsed as JSON. Test and debugging helper.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Pretty-printed JSON with CORS headers.
    pub fn json(status: u16, value: &Value) -> Self {
        let body = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"{}".to_vec());
        Self::new(status, "application/json; charset=utf-8", body).with_cors()
    }

    /// Success envelope.
    pub fn envelope(creator: &str, result: Value) -> Self {
        Self::json(
            200,
            &json!({
                "status": true,
                "creator": creator,
                "result": result,
            }),
        )
    }

    /// Error envelope. Enumerated-parameter errors echo the allowed values.
    pub fn error_envelope(creator: &str, error: &GatewayError) -> Self {
        let mut body = json!({
            "status": false,
            "creator": creator,
            "error": error.public_message(),
        });
        if let Some(allowed) = error.allowed_values() {
            body["allowed"] = json!(allowed);
        }
        Self::json(error.status_code(), &body)
    }

    /// Binary payload.
    pub fn binary(data: Bytes, content_type: &str, cache: CachePolicy) -> Self {
        Self::new(200, content_type, data)
            .with_header("Cache-Control", cache.header_value())
            .with_header("Content-Security-Policy", "default-src 'none'")
            .with_header("X-Content-Type-Options", "nosniff")
            .with_cors()
    }

    /// Binary payload of a freshly stored artifact.
    pub fn artifact(data: Bytes, content_type: &str, id: &str, result_url: &str) -> Self {
        Self::binary(data, content_type, CachePolicy::NoStore)
            .with_header("X-Result-ID", id)
            .with_header("X-Result-URL", result_url)
    }

    /// 302 to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::new(302, "text/plain; charset=utf-8", Bytes::new())
            .with_header("Location", location)
            .with_header("Cache-Control", "no-store")
    }

    /// 302 to the error page carrying status, message and originating endpoint.
    pub fn error_redirect(error_page: &str, error: &GatewayError, from: &str) -> Self {
        let separator = if error_page.contains('?') { '&' } else { '?' };
        let location = format!(
            "{}{}status={}&message={}&from={}",
            error_page,
            separator,
            error.status_code(),
            urlencoding::encode(&error.public_message()),
            urlencoding::encode(from)
        );
        Self::redirect(&location)
    }

    /// 204 answer to a CORS preflight.
    pub fn preflight() -> Self {
        let mut response = Self {
            status: 204,
            headers: Vec::new(),
            body: Bytes::new(),
        }
        .with_cors();
        response
            .headers
            .push(("Access-Control-Max-Age".to_string(), "86400".to_string()));
        response
    }

    /// Prometheus text exposition.
    pub fn prometheus(body: String) -> Self {
        Self::new(200, "text/plain; version=0.0.4", body)
    }
}
