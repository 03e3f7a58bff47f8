// Usage statistics endpoints

use super::IncomingRequest;
use crate::constants::{DEFAULT_LOG_PAGE_SIZE, MAX_LOG_PAGE_SIZE};
use crate::error::GatewayError;
use crate::metadata::Counter;
use crate::responder::EndpointResponse;
use crate::state::AppState;

/// Page size for the log listing: default when absent or unparseable,
/// clamped to `1..=MAX_LOG_PAGE_SIZE` otherwise.
pub fn log_page_size(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(|n| n.clamp(1, MAX_LOG_PAGE_SIZE))
        .unwrap_or(DEFAULT_LOG_PAGE_SIZE)
}

/// `GET /api/stats`
pub async fn summary(state: &AppState) -> Result<EndpointResponse, GatewayError> {
    let counters = state.metadata.counters().await?;
    let mut result = serde_json::Map::new();
    for counter in Counter::ALL {
        result.insert(counter.key().to_string(), counters.get(counter).into());
    }
    result.insert(
        "uptime_seconds".to_string(),
        state.started_at.elapsed().as_secs().into(),
    );
    Ok(EndpointResponse::envelope(
        state.creator(),
        serde_json::Value::Object(result),
    ))
}

/// `GET /api/stats/logs?limit=`: newest request log rows first.
///
/// Rows carry client IPs, user agents and prompt-bearing paths, so the
/// listing sits behind the admin secret.
pub async fn logs(
    state: &AppState,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    super::admin::authorize(state, request)?;

    let limit = log_page_size(request.params().get("limit"));
    let entries = state.metadata.recent_request_logs(limit).await?;
    Ok(EndpointResponse::envelope(
        state.creator(),
        serde_json::json!({
            "count": entries.len(),
            "logs": entries,
        }),
    ))
}

/// `POST /api/stats/visit`: page-view beacon.
pub async fn visit(state: &AppState) -> Result<EndpointResponse, GatewayError> {
    state.accountant.record_visit();
    Ok(EndpointResponse::envelope(
        state.creator(),
        serde_json::json!({ "recorded": true }),
    ))
}
