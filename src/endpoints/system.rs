// Health and metrics endpoints. Neither is accounted nor gated.

use crate::responder::EndpointResponse;
use crate::state::AppState;

/// `GET /health`
pub async fn health(state: &AppState) -> EndpointResponse {
    EndpointResponse::json(
        200,
        &serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "backends": {
                "blob_store": state.artifacts.blob_store().backend_name(),
                "metadata_store": state.metadata.backend_name(),
            },
        }),
    )
    .with_header("Cache-Control", "no-store")
}

/// `GET /metrics`
pub fn metrics(state: &AppState) -> EndpointResponse {
    EndpointResponse::prometheus(state.metrics.export())
}
