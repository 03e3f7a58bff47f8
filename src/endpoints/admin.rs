// Operational controls: maintenance window and per-endpoint toggles
//
// The admin routes are protected by a shared secret sent as
// `X-Admin-Secret` or `Authorization: Bearer <secret>`. With no secret
// configured the routes refuse every caller.

use chrono::Utc;
use serde::de::DeserializeOwned;

use super::IncomingRequest;
use crate::error::GatewayError;
use crate::metadata::{MaintenanceState, ServerStatus};
use crate::responder::EndpointResponse;
use crate::state::AppState;

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

fn presented_secret(request: &IncomingRequest) -> Option<&str> {
    request.header("x-admin-secret").or_else(|| {
        request
            .header("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
    })
}

pub fn authorize(state: &AppState, request: &IncomingRequest) -> Result<(), GatewayError> {
    let expected = state
        .config
        .server
        .admin_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(GatewayError::Unauthorized)?;

    match presented_secret(request) {
        Some(secret) if constant_time_compare(secret.trim(), expected) => Ok(()),
        _ => {
            tracing::warn!(
                path = %request.path,
                client_ip = %request.client_ip,
                "Admin access denied"
            );
            Err(GatewayError::Unauthorized)
        }
    }
}

/// Refuse gated endpoints during maintenance or when switched off.
///
/// A failed control-row read does not take the service down: the request
/// is let through and the failure logged.
pub async fn check_gate(state: &AppState, endpoint: &str) -> Result<(), GatewayError> {
    let (maintenance, status) =
        tokio::join!(state.metadata.maintenance(), state.metadata.server_status());

    match maintenance {
        Ok(maintenance) if maintenance.is_active(Utc::now()) => {
            let mut message = maintenance
                .message
                .unwrap_or_else(|| "service is under maintenance".to_string());
            if let Some(end) = maintenance.end_time {
                message = format!("{} (until {})", message, end.to_rfc3339());
            }
            return Err(GatewayError::Unavailable(message));
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read maintenance state"),
    }

    match status {
        Ok(status) if !status.online => Err(GatewayError::Unavailable(
            "service is offline".to_string(),
        )),
        Ok(status) if !status.allows(endpoint) => Err(GatewayError::Unavailable(format!(
            "endpoint {} is disabled",
            endpoint
        ))),
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read server status");
            Ok(())
        }
    }
}

fn parse_body<T: DeserializeOwned>(request: &IncomingRequest) -> Result<T, GatewayError> {
    serde_json::from_slice(&request.body)
        .map_err(|e| GatewayError::invalid("body", format!("expected a JSON object: {}", e)))
}

fn is_write(request: &IncomingRequest) -> bool {
    request.method.eq_ignore_ascii_case("POST")
}

/// `GET|POST /api/admin/maintenance`
pub async fn maintenance(
    state: &AppState,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    authorize(state, request)?;

    let current = if is_write(request) {
        let update: MaintenanceState = parse_body(request)?;
        state.metadata.set_maintenance(&update).await?;
        tracing::info!(
            enabled = update.enabled,
            end_time = ?update.end_time,
            "Maintenance state updated"
        );
        update
    } else {
        state.metadata.maintenance().await?
    };

    Ok(EndpointResponse::envelope(
        state.creator(),
        serde_json::json!({
            "enabled": current.enabled,
            "active": current.is_active(Utc::now()),
            "end_time": current.end_time,
            "message": current.message,
        }),
    ))
}

/// `GET|POST /api/admin/status`
pub async fn status(
    state: &AppState,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    authorize(state, request)?;

    let current = if is_write(request) {
        let update: ServerStatus = parse_body(request)?;
        state.metadata.set_server_status(&update).await?;
        tracing::info!(
            online = update.online,
            disabled = ?update.disabled_endpoints,
            "Server status updated"
        );
        update
    } else {
        state.metadata.server_status().await?
    };

    Ok(EndpointResponse::envelope(
        state.creator(),
        serde_json::to_value(&current)
            .map_err(|e| GatewayError::Internal(format!("status encoding: {}", e)))?,
    ))
}
