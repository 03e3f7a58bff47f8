// Response classifier
//
// Decides whether a provider body is a JSON document or a binary payload,
// and pulls fields out of JSON using ordered candidate paths. Providers
// rename fields often; callers pass several paths and take the first hit.

use bytes::Bytes;
use serde_json::Value;

use super::UpstreamResponse;
use crate::error::GatewayError;

/// Classified provider body.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderBody {
    Json(Value),
    Binary { bytes: Bytes, content_type: String },
}

fn looks_like_json(body: &[u8]) -> bool {
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .map(|b| *b == b'{' || *b == b'[')
        .unwrap_or(false)
}

/// Classify a successful response.
///
/// A JSON content type, or a body that starts like JSON with no content type,
/// is parsed. A JSON content type with an unparseable body is a provider
/// contract violation. Everything else is binary, typed with the provider's
/// content type or `default_content_type`.
pub fn classify(
    response: UpstreamResponse,
    default_content_type: &str,
) -> Result<ProviderBody, GatewayError> {
    let declared = response
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    let is_json = match declared.as_deref() {
        Some(ct) => ct == "application/json" || ct.ends_with("+json") || ct == "text/json",
        None => looks_like_json(&response.body),
    };

    if is_json {
        let value: Value = serde_json::from_slice(&response.body).map_err(|e| {
            GatewayError::ProviderContract(format!("invalid JSON from provider: {}", e))
        })?;
        return Ok(ProviderBody::Json(value));
    }

    let content_type = match declared {
        // Some providers label images as octet-stream
        Some(ct) if ct != "application/octet-stream" => ct,
        _ => default_content_type.to_string(),
    };

    Ok(ProviderBody::Binary {
        bytes: response.body,
        content_type,
    })
}

/// Resolve a dotted path such as `data.items.0.url`.
///
/// Numeric segments index into arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// First non-empty string (or number) found among `paths`.
pub fn first_string(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(value, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Error message reported by the provider, if the document signals failure.
///
/// `status: false` and `success: false` count, as does a top-level `error`
/// that is `true`, an object or a non-empty string.
pub fn provider_failure(value: &Value) -> Option<String> {
    let flagged = [lookup(value, "status"), lookup(value, "success")]
        .into_iter()
        .flatten()
        .any(|v| v == &Value::Bool(false));
    let error = lookup(value, "error").is_some_and(|v| match v {
        Value::Bool(set) => *set,
        Value::String(s) => !s.trim().is_empty(),
        Value::Object(_) => true,
        _ => false,
    });

    if !flagged && !error {
        return None;
    }

    let message = first_string(value, &["message", "msg", "error.message", "error"])
        .unwrap_or_else(|| "provider reported failure".to_string());
    Some(message)
}
