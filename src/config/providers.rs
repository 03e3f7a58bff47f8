//! Upstream provider configuration.
//!
//! One entry per endpoint that calls a third-party service:
//!
//! ```yaml
//! providers:
//!   text2img:
//!     url: "https://image.example.com/prompt/{prompt}?width={width}&height={height}"
//!     timeout_secs: 30
//!     randomize_identity: true
//!   chat:
//!     url: "https://chat.example.com/api?q={prompt}"
//!     fields:
//!       result: ["result", "data.content", "choices.0.message.content"]
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_BINARY_CONTENT_TYPE;

fn default_content_type() -> String {
    DEFAULT_BINARY_CONTENT_TYPE.to_string()
}

/// HTTP method used for the upstream call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderMethod {
    #[default]
    Get,
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// URL template; `{name}` placeholders are filled with escaped values
    pub url: String,
    #[serde(default)]
    pub method: ProviderMethod,
    /// Abort the call after this many seconds. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Random User-Agent and spoofed client-IP headers per call
    #[serde(default)]
    pub randomize_identity: bool,
    /// Content type assumed when the provider sends none
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
    /// Static headers (API keys, ...). Values support `${ENV}` substitution.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Ordered candidate JSON paths per extracted field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ProviderConfig {
    /// Provider with defaults for everything but the URL template.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: ProviderMethod::default(),
            timeout_secs: None,
            randomize_identity: false,
            default_content_type: default_content_type(),
            headers: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Candidate paths for `field`, falling back to `defaults`.
    pub fn field_paths<'a>(&'a self, field: &str, defaults: &'a [&'a str]) -> Vec<&'a str> {
        match self.fields.get(field) {
            Some(paths) if !paths.is_empty() => paths.iter().map(String::as_str).collect(),
            _ => defaults.to_vec(),
        }
    }
}
