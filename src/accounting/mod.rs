//! Usage accounting.
//!
//! Every accounted request gets a [`RequestTicket`] at entry, which bumps
//! `total_requests`. The ticket is consumed by [`RequestTicket::finish`],
//! which bumps exactly one of `total_success` / `total_errors` and appends a
//! request-log row. A ticket dropped without finishing records a 500, so
//! each request has exactly one terminal event.
//!
//! Store writes happen on a single worker task fed by an unbounded channel.
//! The channel is FIFO, so the entry increment of a request is always
//! applied before its terminal increment. Store failures are logged and
//! never reach the client.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

pub use crate::metadata::RequestLogEntry;
use crate::metadata::{Counter, MetadataStore};
use crate::metrics::GatewayMetrics;

#[derive(Debug)]
enum AccountingEvent {
    Hit,
    Visit,
    Finished(RequestLogEntry),
    Flush(oneshot::Sender<()>),
}

async fn apply(store: &dyn MetadataStore, event: AccountingEvent) {
    match event {
        AccountingEvent::Hit => {
            if let Err(e) = store.increment_counter(Counter::TotalRequests).await {
                tracing::warn!(error = %e, "Failed to increment request counter");
            }
        }
        AccountingEvent::Visit => {
            if let Err(e) = store.increment_counter(Counter::TotalVisitors).await {
                tracing::warn!(error = %e, "Failed to increment visitor counter");
            }
        }
        AccountingEvent::Finished(entry) => {
            let counter = if entry.success {
                Counter::TotalSuccess
            } else {
                Counter::TotalErrors
            };
            if let Err(e) = store.increment_counter(counter).await {
                tracing::warn!(
                    request_id = %entry.request_id,
                    counter = counter.key(),
                    error = %e,
                    "Failed to increment outcome counter"
                );
            }
            if let Err(e) = store.append_request_log(&entry).await {
                tracing::warn!(request_id = %entry.request_id, error = %e, "Failed to append request log");
            }
        }
        AccountingEvent::Flush(done) => {
            let _ = done.send(());
        }
    }
}

/// Entry point for accounting. Cheap to clone.
#[derive(Clone)]
pub struct UsageAccountant {
    tx: mpsc::UnboundedSender<AccountingEvent>,
    pending_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<AccountingEvent>>>>,
    store: Arc<dyn MetadataStore>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl UsageAccountant {
    /// Create an accountant. The worker starts on first use inside a runtime;
    /// events sent before that are buffered.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            pending_rx: Arc::new(Mutex::new(Some(rx))),
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn ensure_worker(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return,
        };

        // Take the receiver under the lock so only one worker is ever spawned
        let rx = match self.pending_rx.lock().take() {
            Some(rx) => rx,
            None => return,
        };

        let store = Arc::clone(&self.store);
        handle.spawn(async move {
            let mut rx = rx;
            while let Some(event) = rx.recv().await {
                apply(store.as_ref(), event).await;
            }
            tracing::debug!("Accounting worker stopped");
        });
    }

    fn send(&self, event: AccountingEvent) {
        self.ensure_worker();
        if self.tx.send(event).is_err() {
            tracing::warn!("Accounting worker is gone, dropping event");
        }
    }

    /// Account a request at entry and hand back its ticket.
    pub fn begin(
        &self,
        endpoint: &str,
        method: &str,
        path: &str,
        client_ip: &str,
        user_agent: Option<String>,
    ) -> RequestTicket {
        self.send(AccountingEvent::Hit);
        let entry = RequestLogEntry::new(
            endpoint.to_string(),
            method.to_string(),
            path.to_string(),
            client_ip.to_string(),
        )
        .with_user_agent(user_agent);

        RequestTicket {
            entry: Some(entry),
            started: Instant::now(),
            accountant: self.clone(),
        }
    }

    pub fn record_visit(&self) {
        self.send(AccountingEvent::Visit);
    }

    /// Wait until every event sent so far has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(AccountingEvent::Flush(done_tx));
        let _ = done_rx.await;
    }
}

/// Accounting handle for one request.
pub struct RequestTicket {
    entry: Option<RequestLogEntry>,
    started: Instant,
    accountant: UsageAccountant,
}

impl RequestTicket {
    pub fn request_id(&self) -> &str {
        self.entry
            .as_ref()
            .map(|e| e.request_id.as_str())
            .unwrap_or_default()
    }

    pub fn endpoint(&self) -> &str {
        self.entry
            .as_ref()
            .map(|e| e.endpoint.as_str())
            .unwrap_or_default()
    }

    /// Re-label the endpoint once routing has resolved it.
    pub fn set_endpoint(&mut self, endpoint: &str) {
        if let Some(entry) = self.entry.as_mut() {
            entry.endpoint = endpoint.to_string();
        }
    }

    /// Record the terminal outcome. Consumes the ticket.
    pub fn finish(mut self, status_code: u16) -> RequestLogEntry {
        self.complete(status_code).unwrap_or_else(|| {
            RequestLogEntry::new(String::new(), String::new(), String::new(), String::new())
        })
    }

    fn complete(&mut self, status_code: u16) -> Option<RequestLogEntry> {
        let entry = self.entry.take()?;
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let entry = entry.with_response(status_code, duration_ms);

        if let Some(metrics) = &self.accountant.metrics {
            metrics.record_request(&entry.endpoint, status_code);
        }

        tracing::info!(
            request_id = %entry.request_id,
            endpoint = %entry.endpoint,
            method = %entry.method,
            path = %entry.path,
            client_ip = %entry.client_ip,
            status_code = status_code,
            duration_ms = duration_ms,
            success = entry.success,
            "Request completed"
        );

        self.accountant
            .send(AccountingEvent::Finished(entry.clone()));
        Some(entry)
    }
}

impl Drop for RequestTicket {
    fn drop(&mut self) {
        if self.entry.is_some() {
            tracing::warn!(request_id = %self.request_id(), "Request ended without an outcome");
            self.complete(500);
        }
    }
}
