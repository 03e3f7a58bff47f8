// Guest quota module
//
// Bounds unauthenticated volume: callers without a user id get
// `guest_weekly_limit` requests per client IP per ISO week. Windows are
// keyed by the Monday that starts the week, so they roll over at 00:00 UTC
// Monday without any cleanup job.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::QuotaConfig;
use crate::error::GatewayError;
use crate::metadata::MetadataStore;
use crate::metrics::GatewayMetrics;

/// Monday of the ISO week containing `date`.
pub fn iso_week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Caller presented a user id, or quota does not apply to the endpoint
    Exempt,
    /// Guest request admitted; `used` includes this request
    Allowed { used: u64, limit: u64 },
}

#[derive(Clone)]
pub struct GuestQuota {
    config: QuotaConfig,
    store: Arc<dyn MetadataStore>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl GuestQuota {
    pub fn new(config: QuotaConfig, store: Arc<dyn MetadataStore>) -> Self {
        Self {
            config,
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn limit(&self) -> u64 {
        self.config.guest_weekly_limit
    }

    /// Count this request against the caller's window, rejecting it once the
    /// window is full.
    ///
    /// The increment happens first and the comparison uses the returned
    /// count, so concurrent guests from one IP cannot both slip under the
    /// limit.
    pub async fn check(
        &self,
        endpoint: &str,
        client_ip: &str,
        user_id: Option<&str>,
        today: NaiveDate,
    ) -> Result<QuotaDecision, GatewayError> {
        if user_id.map(|u| !u.trim().is_empty()).unwrap_or(false)
            || !self.config.applies_to(endpoint)
        {
            return Ok(QuotaDecision::Exempt);
        }

        let week_start = iso_week_start(today);
        let used = self
            .store
            .increment_guest_usage(client_ip, week_start, self.config.retention())
            .await?;
        let limit = self.config.guest_weekly_limit;

        if used > limit {
            if let Some(metrics) = &self.metrics {
                metrics.quota_rejections.inc();
            }
            tracing::info!(
                client_ip = %client_ip,
                endpoint = %endpoint,
                week_start = %week_start,
                used = used,
                limit = limit,
                "Guest weekly limit reached"
            );
            return Err(GatewayError::QuotaExceeded { limit });
        }

        Ok(QuotaDecision::Allowed { used, limit })
    }
}
