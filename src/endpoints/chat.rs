// Chat endpoint: prompt in, provider text out

use chrono::Utc;
use std::time::Instant;

use super::generate::{reject_provider_failure, upstream_error_kind};
use super::IncomingRequest;
use crate::error::GatewayError;
use crate::responder::EndpointResponse;
use crate::state::AppState;
use crate::upstream::{first_string, ProviderBody};

const ENDPOINT: &str = "chat";

/// Candidate locations of the reply text, most specific provider shapes last.
const RESULT_PATHS: &[&str] = &[
    "result",
    "response",
    "answer",
    "message",
    "data.content",
    "data.result",
    "choices.0.message.content",
    "choices.0.text",
];

/// `GET /api/ai/chat?prompt=`
pub async fn chat(
    state: &AppState,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    let params = request.params();
    let prompt = params.require("prompt")?.to_string();
    let provider = state.provider(ENDPOINT)?;

    state
        .quota
        .check(
            ENDPOINT,
            &request.client_ip,
            request.user_id(&params).as_deref(),
            Utc::now().date_naive(),
        )
        .await?;

    let started = Instant::now();
    let body = provider.fetch(&[("prompt", prompt.as_str())]).await;
    state.metrics.record_upstream(ENDPOINT, started.elapsed());
    let body = body.map_err(|e| {
        state
            .metrics
            .record_upstream_error(ENDPOINT, upstream_error_kind(&e));
        e
    })?;

    let reply = match body {
        ProviderBody::Json(doc) => {
            reject_provider_failure(&doc)?;
            let paths = provider.config().field_paths("result", RESULT_PATHS);
            first_string(&doc, &paths).ok_or_else(|| {
                GatewayError::ProviderContract("no reply text in provider response".to_string())
            })?
        }
        // Plain-text providers
        ProviderBody::Binary {
            bytes,
            content_type,
        } if content_type.starts_with("text/") => String::from_utf8_lossy(&bytes).trim().to_string(),
        ProviderBody::Binary { content_type, .. } => {
            return Err(GatewayError::ProviderContract(format!(
                "expected text from chat provider, got {}",
                content_type
            )))
        }
    };

    Ok(EndpointResponse::envelope(
        state.creator(),
        serde_json::json!({
            "prompt": prompt,
            "reply": reply,
        }),
    ))
}
