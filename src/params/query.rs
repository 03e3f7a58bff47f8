// Query string and legacy path segment parsing

use std::collections::HashMap;

use crate::error::GatewayError;

/// Decoded request parameters.
///
/// Later duplicates of a key are ignored, matching how most form parsers
/// treat repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: HashMap<String, String>,
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        // Invalid UTF-8 after decoding; keep the raw text
        Err(_) => spaced,
    }
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                params.insert_missing(decode_component(key), decode_component(value));
            }
        }
        params
    }

    /// Insert a value unless the key is already present.
    pub fn insert_missing(&mut self, key: String, value: String) {
        self.values.entry(key).or_insert(value);
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// A parameter that must be present and non-blank.
    pub fn require(&self, key: &'static str) -> Result<&str, GatewayError> {
        match self.get(key).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(GatewayError::MissingParameter(key)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameters as a JSON object, for artifact records.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Split a legacy `prompt&key=value&...` path segment.
///
/// Older clients append parameters to the path instead of the query string,
/// e.g. `/api/ai/imagine/a%20cat&width=512`. The first piece is the
/// positional value; the rest are `key=value` pairs. Splitting happens on
/// the raw segment so an encoded `%26` stays inside the prompt.
pub fn split_legacy_segment(segment: &str) -> (String, Vec<(String, String)>) {
    let mut pieces = segment.split('&');
    let head = decode_component(pieces.next().unwrap_or_default());
    let pairs = pieces
        .filter_map(|piece| piece.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (decode_component(key), decode_component(value)))
        .collect();
    (head, pairs)
}
