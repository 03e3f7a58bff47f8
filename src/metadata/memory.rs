// In-process metadata store. Used by tests and single-node deployments.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

use crate::constants::DEFAULT_REQUEST_LOG_RETENTION;

use super::{
    ArtifactRecord, Counter, MaintenanceState, MetadataError, MetadataStore, RequestLogEntry,
    ServerStatus, UsageCounters,
};

#[derive(Debug, Clone, Copy)]
struct GuestWindow {
    count: u64,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    artifacts: HashMap<String, ArtifactRecord>,
    counters: UsageCounters,
    request_log: VecDeque<RequestLogEntry>,
    guest_windows: HashMap<(String, NaiveDate), GuestWindow>,
    maintenance: MaintenanceState,
    server_status: ServerStatus,
}

/// Metadata store backed by process memory.
#[derive(Debug)]
pub struct MemoryMetadataStore {
    inner: Mutex<Inner>,
    request_log_retention: usize,
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self {
            inner: Mutex::default(),
            request_log_retention: DEFAULT_REQUEST_LOG_RETENTION,
        }
    }
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `rows` request log rows (at least one).
    pub fn with_request_log_retention(mut self, rows: usize) -> Self {
        self.request_log_retention = rows.max(1);
        self
    }

    /// Number of artifact rows.
    pub fn artifact_count(&self) -> usize {
        self.inner.lock().artifacts.len()
    }

    /// Number of request log rows.
    pub fn request_log_len(&self) -> usize {
        self.inner.lock().request_log.len()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_artifact(&self, record: &ArtifactRecord) -> Result<(), MetadataError> {
        let mut inner = self.inner.lock();
        if inner.artifacts.contains_key(&record.id) {
            return Err(MetadataError::Conflict(record.id.clone()));
        }
        inner.artifacts.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn upsert_artifact(&self, record: &ArtifactRecord) -> Result<(), MetadataError> {
        self.inner
            .lock()
            .artifacts
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_artifact(&self, id: &str) -> Result<Option<ArtifactRecord>, MetadataError> {
        Ok(self.inner.lock().artifacts.get(id).cloned())
    }

    async fn increment_counter(&self, counter: Counter) -> Result<u64, MetadataError> {
        let mut inner = self.inner.lock();
        let value = inner.counters.get(counter) + 1;
        inner.counters.set(counter, value);
        Ok(value)
    }

    async fn counters(&self) -> Result<UsageCounters, MetadataError> {
        Ok(self.inner.lock().counters)
    }

    async fn append_request_log(&self, entry: &RequestLogEntry) -> Result<(), MetadataError> {
        let mut inner = self.inner.lock();
        inner.request_log.push_back(entry.clone());
        while inner.request_log.len() > self.request_log_retention {
            inner.request_log.pop_front();
        }
        Ok(())
    }

    async fn recent_request_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<RequestLogEntry>, MetadataError> {
        let inner = self.inner.lock();
        Ok(inner.request_log.iter().rev().take(limit).cloned().collect())
    }

    async fn increment_guest_usage(
        &self,
        ip: &str,
        week_start: NaiveDate,
        retention: Option<Duration>,
    ) -> Result<u64, MetadataError> {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let key = (ip.to_string(), week_start);

        let window = inner.guest_windows.entry(key).or_insert(GuestWindow {
            count: 0,
            expires_at: None,
        });

        if window.expires_at.map(|at| at <= now).unwrap_or(false) {
            window.count = 0;
            window.expires_at = None;
        }
        if window.count == 0 {
            window.expires_at = retention
                .and_then(|r| chrono::Duration::from_std(r).ok())
                .map(|r| now + r);
        }

        window.count += 1;
        Ok(window.count)
    }

    async fn guest_usage(&self, ip: &str, week_start: NaiveDate) -> Result<u64, MetadataError> {
        let now = Utc::now();
        let inner = self.inner.lock();
        Ok(inner
            .guest_windows
            .get(&(ip.to_string(), week_start))
            .filter(|w| w.expires_at.map(|at| at > now).unwrap_or(true))
            .map(|w| w.count)
            .unwrap_or(0))
    }

    async fn maintenance(&self) -> Result<MaintenanceState, MetadataError> {
        Ok(self.inner.lock().maintenance.clone())
    }

    async fn set_maintenance(&self, state: &MaintenanceState) -> Result<(), MetadataError> {
        self.inner.lock().maintenance = state.clone();
        Ok(())
    }

    async fn server_status(&self) -> Result<ServerStatus, MetadataError> {
        Ok(self.inner.lock().server_status.clone())
    }

    async fn set_server_status(&self, status: &ServerStatus) -> Result<(), MetadataError> {
        self.inner.lock().server_status = status.clone();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
