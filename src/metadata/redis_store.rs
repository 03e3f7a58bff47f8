// Redis metadata store
//
// Key layout (all under the configured prefix):
//   {prefix}:artifact:{id}          JSON ArtifactRecord (SETNX on insert)
//   {prefix}:counters               hash of counter name -> value (HINCRBY)
//   {prefix}:request_log            list of JSON RequestLogEntry, newest first, trimmed
//   {prefix}:guest:{week}:{ip}      integer window count (INCR, optional EXPIRE)
//   {prefix}:maintenance            JSON MaintenanceState
//   {prefix}:server_status          JSON ServerStatus

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::constants::DEFAULT_REQUEST_LOG_RETENTION;

use super::{
    ArtifactRecord, Counter, MaintenanceState, MetadataError, MetadataStore, RequestLogEntry,
    ServerStatus, UsageCounters,
};

/// Metadata store backed by Redis.
pub struct RedisMetadataStore {
    /// Async, multiplexed connection; cloned per command
    connection: ConnectionManager,
    key_prefix: String,
    request_log_retention: usize,
}

impl RedisMetadataStore {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str, key_prefix: String) -> Result<Self, MetadataError> {
        let client = Client::open(url)
            .map_err(|e| MetadataError::Config(format!("Invalid Redis URL: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| MetadataError::Backend(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            key_prefix,
            request_log_retention: DEFAULT_REQUEST_LOG_RETENTION,
        })
    }

    /// Keep at most `rows` request log rows (at least one).
    pub fn with_request_log_retention(mut self, rows: usize) -> Self {
        self.request_log_retention = rows.max(1);
        self
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.key_prefix, suffix)
    }

    fn artifact_key(&self, id: &str) -> String {
        self.key(&format!("artifact:{}", id))
    }

    fn guest_key(&self, ip: &str, week_start: NaiveDate) -> String {
        self.key(&format!("guest:{}:{}", week_start.format("%Y-%m-%d"), ip))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, MetadataError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(MetadataError::from)
    }

    async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), MetadataError> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.connection.clone();
        let _: () = conn.set(key, json).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for RedisMetadataStore {
    async fn insert_artifact(&self, record: &ArtifactRecord) -> Result<(), MetadataError> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.connection.clone();
        let inserted: bool = conn.set_nx(self.artifact_key(&record.id), json).await?;
        if !inserted {
            return Err(MetadataError::Conflict(record.id.clone()));
        }
        Ok(())
    }

    async fn upsert_artifact(&self, record: &ArtifactRecord) -> Result<(), MetadataError> {
        self.set_json(&self.artifact_key(&record.id), record).await
    }

    async fn get_artifact(&self, id: &str) -> Result<Option<ArtifactRecord>, MetadataError> {
        self.get_json(&self.artifact_key(id)).await
    }

    async fn increment_counter(&self, counter: Counter) -> Result<u64, MetadataError> {
        let mut conn = self.connection.clone();
        let value: u64 = conn.hincr(self.key("counters"), counter.key(), 1).await?;
        Ok(value)
    }

    async fn counters(&self) -> Result<UsageCounters, MetadataError> {
        let mut conn = self.connection.clone();
        let raw: HashMap<String, u64> = conn.hgetall(self.key("counters")).await?;

        let mut counters = UsageCounters::default();
        for counter in Counter::ALL {
            counters.set(counter, raw.get(counter.key()).copied().unwrap_or(0));
        }
        Ok(counters)
    }

    async fn append_request_log(&self, entry: &RequestLogEntry) -> Result<(), MetadataError> {
        let json = serde_json::to_string(entry)?;
        let key = self.key("request_log");
        let mut conn = self.connection.clone();
        let _: () = redis::pipe()
            .atomic()
            .lpush(&key, json)
            .ignore()
            .ltrim(&key, 0, self.request_log_retention as isize - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn recent_request_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<RequestLogEntry>, MetadataError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        let raw: Vec<String> = conn
            .lrange(self.key("request_log"), 0, limit as isize - 1)
            .await?;

        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(MetadataError::from))
            .collect()
    }

    async fn increment_guest_usage(
        &self,
        ip: &str,
        week_start: NaiveDate,
        retention: Option<Duration>,
    ) -> Result<u64, MetadataError> {
        let key = self.guest_key(ip, week_start);
        let mut conn = self.connection.clone();
        let count: u64 = conn.incr(&key, 1).await?;

        if count == 1 {
            if let Some(retention) = retention {
                let _: bool = conn.expire(&key, retention.as_secs() as i64).await?;
            }
        }
        Ok(count)
    }

    async fn guest_usage(&self, ip: &str, week_start: NaiveDate) -> Result<u64, MetadataError> {
        let mut conn = self.connection.clone();
        let count: Option<u64> = conn.get(self.guest_key(ip, week_start)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn maintenance(&self) -> Result<MaintenanceState, MetadataError> {
        Ok(self
            .get_json(&self.key("maintenance"))
            .await?
            .unwrap_or_default())
    }

    async fn set_maintenance(&self, state: &MaintenanceState) -> Result<(), MetadataError> {
        self.set_json(&self.key("maintenance"), state).await
    }

    async fn server_status(&self) -> Result<ServerStatus, MetadataError> {
        Ok(self
            .get_json(&self.key("server_status"))
            .await?
            .unwrap_or_default())
    }

    async fn set_server_status(&self, status: &ServerStatus) -> Result<(), MetadataError> {
        self.set_json(&self.key("server_status"), status).await
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
