// Metrics module - Prometheus metrics for the gateway
//
// Process-level counters and histograms, served at /metrics. These are
// independent of the usage counters in the metadata store, which survive
// restarts and feed /api/stats.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Gateway metrics registered on a registry owned by this struct.
pub struct GatewayMetrics {
    registry: Registry,

    /// Completed requests by endpoint and status code
    pub requests: IntCounterVec,

    /// Upstream call latency by provider (seconds)
    pub upstream_duration: HistogramVec,

    /// Upstream failures by provider and kind (status, timeout, contract)
    pub upstream_errors: IntCounterVec,

    /// Watermark composition time (seconds)
    pub composite_duration: Histogram,

    /// Blob uploads by artifact kind and outcome
    pub artifact_uploads: IntCounterVec,

    /// Guest requests rejected by the weekly quota
    pub quota_rejections: IntCounter,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("kagami_requests_total", "Completed requests by endpoint and status"),
            &["endpoint", "status"],
        )?;

        let upstream_duration = HistogramVec::new(
            HistogramOpts::new(
                "kagami_upstream_duration_seconds",
                "Duration of upstream provider calls in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["provider"],
        )?;

        let upstream_errors = IntCounterVec::new(
            Opts::new("kagami_upstream_errors_total", "Failed upstream calls"),
            &["provider", "kind"],
        )?;

        let composite_duration = Histogram::with_opts(
            HistogramOpts::new(
                "kagami_composite_duration_seconds",
                "Duration of watermark composition in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )?;

        let artifact_uploads = IntCounterVec::new(
            Opts::new("kagami_artifact_uploads_total", "Artifact blob uploads"),
            &["kind", "outcome"],
        )?;

        let quota_rejections = IntCounter::new(
            "kagami_guest_quota_rejections_total",
            "Guest requests rejected by the weekly quota",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(upstream_duration.clone()))?;
        registry.register(Box::new(upstream_errors.clone()))?;
        registry.register(Box::new(composite_duration.clone()))?;
        registry.register(Box::new(artifact_uploads.clone()))?;
        registry.register(Box::new(quota_rejections.clone()))?;

        Ok(Self {
            registry,
            requests,
            upstream_duration,
            upstream_errors,
            composite_duration,
            artifact_uploads,
            quota_rejections,
        })
    }

    pub fn record_request(&self, endpoint: &str, status: u16) {
        self.requests
            .with_label_values(&[endpoint, &status.to_string()])
            .inc();
    }

    pub fn record_upstream(&self, provider: &str, elapsed: Duration) {
        self.upstream_duration
            .with_label_values(&[provider])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_upstream_error(&self, provider: &str, kind: &str) {
        self.upstream_errors
            .with_label_values(&[provider, kind])
            .inc();
    }

    pub fn record_composite(&self, elapsed: Duration) {
        self.composite_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_upload(&self, kind: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.artifact_uploads
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
