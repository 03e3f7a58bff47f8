//! Server configuration types.
//!
//! This module defines the server-level configuration including:
//! - Address and port bindings
//! - Envelope branding and the public base URL used in result links
//! - The admin shared secret
//! - Log output format
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CREATOR, DEFAULT_ERROR_PAGE, DEFAULT_THREADS};

// Default worker thread count
fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_creator() -> String {
    DEFAULT_CREATOR.to_string()
}

fn default_error_page() -> String {
    DEFAULT_ERROR_PAGE.to_string()
}

fn default_true() -> bool {
    true
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Number of worker threads (default: 4)
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Absolute origin for `X-Result-URL` (e.g. `https://api.example.com`).
    /// Relative paths are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
    /// `creator` field of JSON envelopes
    #[serde(default = "default_creator")]
    pub creator: String,
    /// Shared secret for `/api/admin/*`; admin routes are disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
    /// Browser-facing error page that failed redirects point at
    #[serde(default = "default_error_page")]
    pub error_page: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Take the client IP from the first `X-Forwarded-For` entry
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,
}

impl ServerConfig {
    /// Build an absolute (or relative, when no base URL is set) link.
    pub fn public_url(&self, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => path.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            threads: default_threads(),
            public_base_url: None,
            creator: default_creator(),
            admin_secret: None,
            error_page: default_error_page(),
            log_format: LogFormat::default(),
            trust_forwarded_for: true,
        }
    }
}
