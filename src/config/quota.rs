//! Guest quota configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_GUEST_WEEKLY_LIMIT;

fn default_true() -> bool {
    true
}

fn default_limit() -> u64 {
    DEFAULT_GUEST_WEEKLY_LIMIT
}

fn default_endpoints() -> Vec<String> {
    ["text2img", "imagine", "chat", "audio_download", "watermark"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Weekly request ceiling for callers without a user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requests allowed per IP per ISO week
    #[serde(default = "default_limit")]
    pub guest_weekly_limit: u64,
    /// Days a guest window is kept; 0 keeps windows forever
    #[serde(default)]
    pub retention_days: u64,
    /// Endpoint names the quota applies to
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            guest_weekly_limit: default_limit(),
            retention_days: 0,
            endpoints: default_endpoints(),
        }
    }
}

impl QuotaConfig {
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_days > 0).then(|| Duration::from_secs(self.retention_days * 86_400))
    }

    pub fn applies_to(&self, endpoint: &str) -> bool {
        self.enabled && self.endpoints.iter().any(|e| e == endpoint)
    }
}
