// Image generation endpoints: text2img (binary) and imagine (redirect)

use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;

use super::IncomingRequest;
use crate::artifact::{BlobPayload, DisplayInfo};
use crate::error::GatewayError;
use crate::metadata::{ArtifactKind, ArtifactRecord};
use crate::params::{resolve_watermark, split_legacy_segment, GenerationParams, QueryParams};
use crate::responder::EndpointResponse;
use crate::state::AppState;
use crate::upstream::{first_string, is_http_url, provider_failure, Provider, ProviderBody};
use crate::watermark::{composite_blocking, OutputFormat, WatermarkError, WatermarkSpec};

/// Where image providers that answer with JSON put the image link.
const IMAGE_URL_PATHS: &[&str] = &[
    "url",
    "image",
    "result",
    "data.url",
    "data.0.url",
    "images.0",
    "output.0",
];

/// Metric label for a failed upstream call.
pub(crate) fn upstream_error_kind(error: &GatewayError) -> &'static str {
    match error {
        GatewayError::UpstreamTimeout(_) => "timeout",
        GatewayError::ProviderContract(_) => "contract",
        GatewayError::Upstream { .. } => "status",
        _ => "other",
    }
}

/// Turn a provider's "failed" JSON document into an error.
pub(crate) fn reject_provider_failure(doc: &serde_json::Value) -> Result<(), GatewayError> {
    match provider_failure(doc) {
        Some(message) => Err(GatewayError::Upstream {
            status: 502,
            message,
        }),
        None => Ok(()),
    }
}

/// Image bytes from a provider that answers either with the image itself or
/// with a JSON document pointing at it.
pub(crate) async fn fetch_image(
    provider: &Provider,
    values: &[(&str, &str)],
) -> Result<Bytes, GatewayError> {
    match provider.fetch(values).await? {
        ProviderBody::Binary { bytes, .. } => Ok(bytes),
        ProviderBody::Json(doc) => {
            reject_provider_failure(&doc)?;
            let paths = provider.config().field_paths("image", IMAGE_URL_PATHS);
            let url = first_string(&doc, &paths).ok_or_else(|| {
                GatewayError::ProviderContract("no image url in provider response".to_string())
            })?;
            if !is_http_url(&url) {
                return Err(GatewayError::ProviderContract(format!(
                    "provider returned a non-http image url: {}",
                    url
                )));
            }
            Ok(provider.follow(&url).await?.body)
        }
    }
}

/// Validate, generate, watermark and persist one image.
async fn generate_watermarked(
    state: &AppState,
    request: &IncomingRequest,
    endpoint: &'static str,
    params: &QueryParams,
) -> Result<(ArtifactRecord, Bytes), GatewayError> {
    let generation = GenerationParams::resolve(params)?;
    let preset = state.preset(endpoint)?;
    let spec = resolve_watermark(params, preset)?;
    let format = preset.format;
    let provider = state.provider(endpoint)?;

    state
        .quota
        .check(
            endpoint,
            &request.client_ip,
            request.user_id(params).as_deref(),
            Utc::now().date_naive(),
        )
        .await?;

    let width = generation.width.to_string();
    let height = generation.height.to_string();
    let values = [
        ("prompt", generation.prompt.as_str()),
        ("width", width.as_str()),
        ("height", height.as_str()),
    ];

    let started = Instant::now();
    let (base, mark) = tokio::join!(
        fetch_image(provider, &values),
        state.watermark_fetcher.fetch(&preset.source)
    );
    state.metrics.record_upstream(endpoint, started.elapsed());
    let base = base.map_err(|e| {
        state
            .metrics
            .record_upstream_error(endpoint, upstream_error_kind(&e));
        e
    })?;
    let mark = mark?;

    let composed = compose(state, endpoint, base, mark, spec, format).await?;
    let content_type = composed.0.content_type();
    let data = composed.1;

    let mut record_params = generation.to_json();
    record_params["watermark"] = watermark_summary(&spec);
    let record = state
        .artifacts
        .persist(
            ArtifactKind::Image,
            endpoint,
            record_params,
            BlobPayload::new(data.clone(), content_type),
            None,
            DisplayInfo {
                title: Some(generation.prompt.clone()),
                ..Default::default()
            },
        )
        .await?;

    Ok((record, data))
}

pub(crate) fn watermark_summary(spec: &WatermarkSpec) -> serde_json::Value {
    serde_json::json!({
        "size": (spec.size_fraction * 100.0).round() as u32,
        "opacity": (spec.opacity * 100.0).round() as u32,
        "anchor": format!("{:?}", spec.anchor),
    })
}

/// Composite on the blocking pool and record the duration.
///
/// A base image that does not decode came from the upstream, so it is a
/// provider contract failure (502) rather than an internal one.
pub(crate) async fn compose(
    state: &AppState,
    endpoint: &'static str,
    base: Bytes,
    mark: Bytes,
    spec: WatermarkSpec,
    format: OutputFormat,
) -> Result<(OutputFormat, Bytes), GatewayError> {
    let started = Instant::now();
    let composed = composite_blocking(base, mark, spec, format)
        .await
        .map_err(|e| match e {
            WatermarkError::EmptyInput("base")
            | WatermarkError::DecodeError { role: "base", .. } => {
                state.metrics.record_upstream_error(endpoint, "contract");
                GatewayError::ProviderContract(format!("provider returned an unusable image: {}", e))
            }
            other => GatewayError::from(other),
        })?;
    state.metrics.record_composite(started.elapsed());
    tracing::debug!(
        width = composed.width,
        height = composed.height,
        format = %composed.format,
        bytes = composed.data.len(),
        "Watermark composited"
    );
    Ok((composed.format, Bytes::from(composed.data)))
}

/// `GET /api/ai/text2img`: watermarked image bytes.
pub async fn text2img(
    state: &AppState,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    let params = request.params();
    let (record, data) = generate_watermarked(state, request, "text2img", &params).await?;
    Ok(EndpointResponse::artifact(
        data,
        &record.primary_content_type,
        &record.id,
        &state.result_url("image", &record.id),
    ))
}

/// `GET /api/ai/imagine/{prompt}`: redirect to the stored result.
///
/// The prompt segment may carry legacy `&width=..&height=..` pairs; explicit
/// query parameters take precedence over them.
pub async fn imagine(
    state: &AppState,
    request: &IncomingRequest,
    segment: &str,
) -> Result<EndpointResponse, GatewayError> {
    let (prompt, legacy_pairs) = split_legacy_segment(segment);
    let mut params = request.params();
    for (key, value) in legacy_pairs {
        params.insert_missing(key, value);
    }
    params.set("prompt", prompt);

    let (record, _) = generate_watermarked(state, request, "imagine", &params).await?;
    Ok(EndpointResponse::redirect(
        &state.result_url("image", &record.id),
    ))
}
