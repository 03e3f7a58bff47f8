// Audio downloader endpoint
//
// The provider answers with a metadata document (title, author, links).
// The audio is the artifact's primary blob; cover art is a secondary blob
// whose fetch or upload failure never fails the request.

use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;

use super::generate::{reject_provider_failure, upstream_error_kind};
use super::IncomingRequest;
use crate::artifact::{BlobPayload, DisplayInfo};
use crate::error::GatewayError;
use crate::metadata::ArtifactKind;
use crate::responder::EndpointResponse;
use crate::state::AppState;
use crate::upstream::{first_string, is_http_url, Provider, ProviderBody};

const ENDPOINT: &str = "audio_download";

const AUDIO_PATHS: &[&str] = &[
    "audio",
    "download_url",
    "url",
    "data.audio",
    "data.download",
    "data.url",
    "result.audio",
    "result.url",
];
const TITLE_PATHS: &[&str] = &["title", "data.title", "result.title"];
const AUTHOR_PATHS: &[&str] = &[
    "author",
    "channel",
    "data.author",
    "result.author",
    "result.channel",
];
const THUMBNAIL_PATHS: &[&str] = &[
    "thumbnail",
    "cover",
    "data.thumbnail",
    "result.thumbnail",
    "result.cover",
];

fn field(provider: &Provider, doc: &serde_json::Value, name: &str, defaults: &[&str]) -> Option<String> {
    first_string(doc, &provider.config().field_paths(name, defaults))
}

async fn fetch_cover(provider: &Provider, url: Option<&str>) -> Option<(Bytes, String)> {
    let url = url.filter(|u| is_http_url(u))?;
    match provider.follow(url).await {
        Ok(response) => {
            let content_type = response
                .content_type
                .filter(|ct| ct.starts_with("image/"))
                .unwrap_or_else(|| "image/jpeg".to_string());
            Some((response.body, content_type))
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Cover fetch failed, continuing without it");
            None
        }
    }
}

/// `GET /api/download/audio?url=`
pub async fn audio(
    state: &AppState,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    let params = request.params();
    let source_url = params.require("url")?.to_string();
    if !is_http_url(&source_url) {
        return Err(GatewayError::invalid("url", "must be an http(s) URL"));
    }
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
    let doc = match provider.fetch(&[("url", source_url.as_str())]).await {
        Ok(ProviderBody::Json(doc)) => doc,
        Ok(ProviderBody::Binary { content_type, .. }) => {
            return Err(GatewayError::ProviderContract(format!(
                "expected a metadata document, got {}",
                content_type
            )))
        }
        Err(e) => {
            state
                .metrics
                .record_upstream_error(ENDPOINT, upstream_error_kind(&e));
            return Err(e);
        }
    };
    reject_provider_failure(&doc)?;

    let audio_url = field(provider, &doc, "audio", AUDIO_PATHS)
        .filter(|u| is_http_url(u))
        .ok_or_else(|| {
            GatewayError::ProviderContract("no audio link in provider response".to_string())
        })?;
    let title = field(provider, &doc, "title", TITLE_PATHS);
    let author = field(provider, &doc, "author", AUTHOR_PATHS);
    let thumbnail = field(provider, &doc, "thumbnail", THUMBNAIL_PATHS);

    let (audio, cover) = tokio::join!(
        provider.follow(&audio_url),
        fetch_cover(provider, thumbnail.as_deref())
    );
    state.metrics.record_upstream(ENDPOINT, started.elapsed());
    let audio = audio?;
    let audio_type = audio
        .content_type
        .filter(|ct| ct.starts_with("audio/"))
        .unwrap_or_else(|| "audio/mpeg".to_string());

    let record = state
        .artifacts
        .persist(
            ArtifactKind::Audio,
            ENDPOINT,
            serde_json::json!({ "url": source_url }),
            BlobPayload::new(audio.body, audio_type),
            cover.map(|(data, content_type)| ("cover", BlobPayload::new(data, content_type))),
            DisplayInfo {
                title: title.clone(),
                author: author.clone(),
                thumbnail: thumbnail.clone(),
            },
        )
        .await?;

    let cover_url = record
        .secondary_path
        .as_ref()
        .map(|_| state.result_url("cover", &record.id));

    Ok(EndpointResponse::envelope(
        state.creator(),
        serde_json::json!({
            "id": record.id,
            "title": title,
            "author": author,
            "thumbnail": thumbnail,
            "audio_url": state.result_url("audio", &record.id),
            "cover_url": cover_url,
        }),
    ))
}
