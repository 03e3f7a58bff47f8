//! Upstream fetcher.
//!
//! A [`Provider`] renders its URL template, attaches static and randomized
//! headers, and performs exactly one call through an [`UpstreamClient`].
//! There are no retries: a failed call surfaces to the caller as a
//! [`GatewayError`] and the request is accounted as an error.
//!
//! The transport sits behind a trait so request pipelines can be exercised
//! without network access.

pub mod classify;
mod identity;
mod template;

pub use classify::{classify, first_string, lookup, provider_failure, ProviderBody};
pub use identity::Identity;
pub use template::{TemplateError, UrlTemplate};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{ProviderConfig, ProviderMethod};
use crate::constants::MAX_UPSTREAM_MESSAGE_LEN;
use crate::error::GatewayError;

/// A single outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: ProviderMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

/// Raw provider response, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below HTTP: DNS, connect, TLS, body read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let mut builder = match request.method {
            ProviderMethod::Get => self.client.get(&request.url),
            ProviderMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(format!("request failed: {}", e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(format!("failed to read body: {}", e)))?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

fn truncate_message(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() <= MAX_UPSTREAM_MESSAGE_LEN {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_UPSTREAM_MESSAGE_LEN).collect();
    truncated.push_str("...");
    truncated
}

/// Send one request, enforcing the optional timeout and the success
/// contract (2xx with a non-empty body).
pub async fn execute(
    client: &dyn UpstreamClient,
    request: UpstreamRequest,
    timeout: Option<Duration>,
) -> Result<UpstreamResponse, GatewayError> {
    let send = client.send(request);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, send)
            .await
            .map_err(|_| GatewayError::UpstreamTimeout(limit.as_secs()))?,
        None => send.await,
    };

    let response = result.map_err(|e| GatewayError::Upstream {
        status: 502,
        message: e.to_string(),
    })?;

    if !response.is_success() {
        return Err(GatewayError::Upstream {
            status: response.status,
            message: truncate_message(&response.body),
        });
    }
    if response.body.is_empty() {
        return Err(GatewayError::Upstream {
            status: response.status,
            message: "provider returned an empty body".to_string(),
        });
    }

    Ok(response)
}

/// Plain GET of a caller-supplied URL.
pub async fn fetch_url(
    client: &dyn UpstreamClient,
    url: &str,
    timeout: Option<Duration>,
) -> Result<UpstreamResponse, GatewayError> {
    let request = UpstreamRequest {
        method: ProviderMethod::Get,
        url: url.to_string(),
        headers: Vec::new(),
        body: None,
    };
    execute(client, request, timeout).await
}

/// Whether `value` is an absolute http(s) URL.
pub fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// A configured provider bound to a transport.
#[derive(Clone)]
pub struct Provider {
    name: String,
    config: ProviderConfig,
    template: UrlTemplate,
    client: Arc<dyn UpstreamClient>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("url", &self.config.url)
            .finish()
    }
}

impl Provider {
    pub fn new(
        name: impl Into<String>,
        config: ProviderConfig,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, GatewayError> {
        let name = name.into();
        let template = UrlTemplate::parse(&config.url).map_err(|e| {
            GatewayError::Internal(format!("provider '{}' url template: {}", name, e))
        })?;
        Ok(Self {
            name,
            config,
            template,
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the outbound request for the given placeholder values.
    ///
    /// POST providers also receive the values as a JSON object body.
    pub fn build_request(&self, values: &[(&str, &str)]) -> Result<UpstreamRequest, GatewayError> {
        let url = self.template.render(values).map_err(|e| {
            GatewayError::Internal(format!("provider '{}' url template: {}", self.name, e))
        })?;

        let mut headers: Vec<(String, String)> = self
            .config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if self.config.randomize_identity {
            headers.extend(Identity::random().headers());
        }

        let body = match self.config.method {
            ProviderMethod::Get => None,
            ProviderMethod::Post => Some(serde_json::Value::Object(
                values
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                    .collect(),
            )),
        };

        Ok(UpstreamRequest {
            method: self.config.method,
            url,
            headers,
            body,
        })
    }

    /// Perform the call and return a successful, non-empty response.
    pub async fn call(&self, values: &[(&str, &str)]) -> Result<UpstreamResponse, GatewayError> {
        let request = self.build_request(values)?;
        tracing::debug!(provider = %self.name, method = ?request.method, "Calling provider");
        execute(self.client.as_ref(), request, self.config.timeout()).await
    }

    /// GET a URL handed back by this provider (download links, cover art)
    /// with the provider's headers and timeout.
    pub async fn follow(&self, url: &str) -> Result<UpstreamResponse, GatewayError> {
        let mut headers: Vec<(String, String)> = self
            .config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if self.config.randomize_identity {
            headers.extend(Identity::random().headers());
        }
        let request = UpstreamRequest {
            method: ProviderMethod::Get,
            url: url.to_string(),
            headers,
            body: None,
        };
        execute(self.client.as_ref(), request, self.config.timeout()).await
    }

    /// Call and classify in one step.
    pub async fn fetch(&self, values: &[(&str, &str)]) -> Result<ProviderBody, GatewayError> {
        let response = self.call(values).await?;
        classify(response, &self.config.default_content_type)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout()
    }
}
