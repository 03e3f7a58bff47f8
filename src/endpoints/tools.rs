// Watermark tool: caller-supplied base image, optional caller-supplied logo

use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;

use super::generate::{compose, upstream_error_kind, watermark_summary};
use super::IncomingRequest;
use crate::artifact::{BlobPayload, DisplayInfo};
use crate::config::WatermarkPreset;
use crate::constants::DEFAULT_UPSTREAM_TIMEOUT_SECS;
use crate::error::GatewayError;
use crate::metadata::ArtifactKind;
use crate::params::{resolve_format, resolve_watermark};
use crate::responder::EndpointResponse;
use crate::state::AppState;
use crate::upstream::{fetch_url, is_http_url};

const ENDPOINT: &str = "watermark";

/// `GET /api/tools/watermark?url=&logo=&position=&size=&opacity=&format=`
///
/// Without `logo`, the `watermark` preset's asset is used. Without that
/// preset, `logo` is required.
pub async fn watermark(
    state: &AppState,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    let params = request.params();

    let base_url = params.require("url")?.to_string();
    if !is_http_url(&base_url) {
        return Err(GatewayError::invalid("url", "must be an http(s) URL"));
    }
    let logo_url = match params.get("logo").map(str::trim) {
        Some(logo) if !logo.is_empty() => {
            if !is_http_url(logo) {
                return Err(GatewayError::invalid("logo", "must be an http(s) URL"));
            }
            Some(logo.to_string())
        }
        _ => None,
    };

    let preset = match (state.config.watermark.preset(ENDPOINT), &logo_url) {
        (Some(preset), _) => preset.clone(),
        (None, Some(logo)) => WatermarkPreset::new(logo.clone()),
        (None, None) => return Err(GatewayError::MissingParameter("logo")),
    };
    let spec = resolve_watermark(&params, &preset)?;
    let format = resolve_format(&params, &preset)?;

    state
        .quota
        .check(
            ENDPOINT,
            &request.client_ip,
            request.user_id(&params).as_deref(),
            Utc::now().date_naive(),
        )
        .await?;

    let timeout = Some(std::time::Duration::from_secs(
        DEFAULT_UPSTREAM_TIMEOUT_SECS,
    ));
    let client = state.upstream.as_ref();
    let started = Instant::now();
    let (base, mark) = tokio::join!(fetch_url(client, &base_url, timeout), async {
        match &logo_url {
            Some(logo) => fetch_url(client, logo, timeout).await.map(|r| r.body),
            None => Ok::<Bytes, GatewayError>(state.watermark_fetcher.fetch(&preset.source).await?),
        }
    });
    state.metrics.record_upstream(ENDPOINT, started.elapsed());
    let base = base
        .map_err(|e| {
            state
                .metrics
                .record_upstream_error(ENDPOINT, upstream_error_kind(&e));
            e
        })?
        .body;
    let mark = mark?;

    let (format, data) = compose(state, ENDPOINT, base, mark, spec, format).await?;

    let record = state
        .artifacts
        .persist(
            ArtifactKind::Image,
            ENDPOINT,
            serde_json::json!({
                "url": base_url,
                "logo": logo_url,
                "format": format.to_string(),
                "watermark": watermark_summary(&spec),
            }),
            BlobPayload::new(data.clone(), format.content_type()),
            None,
            DisplayInfo::default(),
        )
        .await?;

    Ok(EndpointResponse::artifact(
        data,
        format.content_type(),
        &record.id,
        &state.result_url("image", &record.id),
    ))
}
