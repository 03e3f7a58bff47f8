//! Rows persisted in the metadata store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a generated artifact contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Audio,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Audio => "audio",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ArtifactKind::Image),
            "audio" => Ok(ArtifactKind::Audio),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// Metadata row for one generated artifact.
///
/// Written once per successful generation and keyed by `id`, which is also
/// the stem of every blob key belonging to the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub kind: ArtifactKind,
    /// Endpoint that produced the artifact
    pub endpoint: String,
    /// Originating request parameters (prompt, dimensions, source url, ...)
    pub params: serde_json::Value,
    pub primary_path: String,
    pub primary_content_type: String,
    /// Companion blob (cover art, companion audio); absent if its upload failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Named usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    TotalRequests,
    TotalSuccess,
    TotalErrors,
    TotalVisitors,
}

impl Counter {
    pub const ALL: [Counter; 4] = [
        Counter::TotalRequests,
        Counter::TotalSuccess,
        Counter::TotalErrors,
        Counter::TotalVisitors,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Counter::TotalRequests => "total_requests",
            Counter::TotalSuccess => "total_success",
            Counter::TotalErrors => "total_errors",
            Counter::TotalVisitors => "total_visitors",
        }
    }
}

/// Snapshot of all usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub total_requests: u64,
    pub total_success: u64,
    pub total_errors: u64,
    pub total_visitors: u64,
}

impl UsageCounters {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::TotalRequests => self.total_requests,
            Counter::TotalSuccess => self.total_success,
            Counter::TotalErrors => self.total_errors,
            Counter::TotalVisitors => self.total_visitors,
        }
    }

    pub fn set(&mut self, counter: Counter, value: u64) {
        match counter {
            Counter::TotalRequests => self.total_requests = value,
            Counter::TotalSuccess => self.total_success = value,
            Counter::TotalErrors => self.total_errors = value,
            Counter::TotalVisitors => self.total_visitors = value,
        }
    }
}

/// One row per completed request. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    /// Completion time
    pub timestamp: DateTime<Utc>,

    /// Correlates the row with structured log lines
    pub request_id: String,

    /// Logical endpoint name (`text2img`, `result`, ...)
    pub endpoint: String,

    pub method: String,

    pub path: String,

    pub status_code: u16,

    pub success: bool,

    pub client_ip: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    pub duration_ms: u64,
}

impl RequestLogEntry {
    /// Create an entry with required fields; the response is filled in later.
    pub fn new(endpoint: String, method: String, path: String, client_ip: String) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
            endpoint,
            method,
            path,
            status_code: 0,
            success: false,
            client_ip,
            user_agent: None,
            duration_ms: 0,
        }
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Record the terminal outcome. Statuses below 400 count as success.
    pub fn with_response(mut self, status_code: u16, duration_ms: u64) -> Self {
        self.timestamp = Utc::now();
        self.status_code = status_code;
        self.success = status_code < 400;
        self.duration_ms = duration_ms;
        self
    }
}

/// Maintenance flag row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceState {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MaintenanceState {
    /// Enabled and not yet past its end time.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.end_time.map(|end| now < end).unwrap_or(true)
    }
}

/// Operational toggles row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub online: bool,
    #[serde(default)]
    pub disabled_endpoints: Vec<String>,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self {
            online: true,
            disabled_endpoints: Vec::new(),
        }
    }
}

impl ServerStatus {
    pub fn allows(&self, endpoint: &str) -> bool {
        self.online && !self.disabled_endpoints.iter().any(|e| e == endpoint)
    }
}
