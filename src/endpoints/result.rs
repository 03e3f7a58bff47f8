// Stored result retrieval: GET /api/result/{kind}/{id}

use sha2::{Digest, Sha256};

use super::IncomingRequest;
use crate::artifact::BlobRole;
use crate::error::GatewayError;
use crate::metadata::ArtifactKind;
use crate::responder::{CachePolicy, EndpointResponse};
use crate::state::AppState;

const KINDS: &[&str] = &["image", "audio", "cover"];

/// Strong ETag over the blob bytes.
pub fn etag_for(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(data)))
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

/// Serve the primary blob (`image`, `audio`) or the secondary blob
/// (`cover`) of a stored artifact.
///
/// Blobs never change once written, so the response is marked immutable.
pub async fn retrieve(
    state: &AppState,
    request: &IncomingRequest,
    kind: &str,
    id: &str,
) -> Result<EndpointResponse, GatewayError> {
    let (expected, role) = match kind {
        "image" => (ArtifactKind::Image, BlobRole::Primary),
        "audio" => (ArtifactKind::Audio, BlobRole::Primary),
        "cover" => (ArtifactKind::Audio, BlobRole::Secondary),
        other => return Err(GatewayError::invalid_choice("kind", other, KINDS)),
    };

    let record = state.artifacts.load(id).await?;
    if record.kind != expected {
        return Err(GatewayError::NotFound(format!(
            "result {} has no {}",
            record.id, kind
        )));
    }

    let (data, content_type) = state.artifacts.load_blob(&record, role).await?;
    let etag = etag_for(&data);

    if request
        .header("if-none-match")
        .map(|value| etag_matches(value, &etag))
        .unwrap_or(false)
    {
        let mut response = EndpointResponse::binary(
            bytes::Bytes::new(),
            &content_type,
            CachePolicy::Immutable,
        )
        .with_header("ETag", etag);
        response.status = 304;
        return Ok(response);
    }

    Ok(EndpointResponse::binary(data, &content_type, CachePolicy::Immutable)
        .with_header("ETag", etag)
        .with_header("X-Result-ID", record.id))
}
