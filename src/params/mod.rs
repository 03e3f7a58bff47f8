//! Parameter resolver.
//!
//! Turns raw query strings and path segments into typed, defaulted
//! parameters. Every check here runs before any network I/O, so a rejected
//! request never reaches a provider.

mod query;

pub use query::{split_legacy_segment, QueryParams};

use crate::config::WatermarkPreset;
use crate::constants::{DEFAULT_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, MIN_IMAGE_DIMENSION};
use crate::error::GatewayError;
use crate::watermark::{Anchor, Gravity, OutputFormat, WatermarkSpec};

/// Parse a 1-100 percentage, clamping out-of-range values.
///
/// Unparseable or missing input yields `default`. A trailing `%` is accepted.
pub fn parse_percent(value: Option<&str>, default: u8) -> u8 {
    value
        .map(|v| v.trim().trim_end_matches('%'))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(1.0, 100.0) as u8)
        .unwrap_or(default)
}

/// Parse an image edge length, clamped to the supported range.
pub fn parse_dimension(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(MIN_IMAGE_DIMENSION as f64, MAX_IMAGE_DIMENSION as f64) as u32)
        .unwrap_or(DEFAULT_IMAGE_DIMENSION)
}

/// Parse an enumerated parameter, echoing the allowed set on rejection.
pub fn parse_choice<T: std::str::FromStr>(
    name: &'static str,
    value: &str,
    allowed: &[&str],
) -> Result<T, GatewayError> {
    value
        .parse::<T>()
        .map_err(|_| GatewayError::invalid_choice(name, value, allowed))
}

/// Prompt plus output dimensions for image generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

impl GenerationParams {
    pub fn resolve(params: &QueryParams) -> Result<Self, GatewayError> {
        let prompt = params.require("prompt")?.to_string();
        Ok(Self {
            prompt,
            width: parse_dimension(params.get("width")),
            height: parse_dimension(params.get("height")),
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "prompt": self.prompt,
            "width": self.width,
            "height": self.height,
        })
    }
}

/// Resolve a watermark spec from request overrides on top of a preset.
///
/// `position` must be a gravity name; `x` and `y` together give an explicit
/// offset and win over `position`.
pub fn resolve_watermark(
    params: &QueryParams,
    preset: &WatermarkPreset,
) -> Result<WatermarkSpec, GatewayError> {
    let preset_anchor = preset
        .anchor()
        .map_err(|e| GatewayError::Internal(format!("watermark preset: {}", e)))?;

    let anchor = match (params.get("x"), params.get("y")) {
        (Some(x), Some(y)) => Anchor::Offset {
            x: x
                .trim()
                .parse()
                .map_err(|_| GatewayError::invalid("x", "must be an integer pixel offset"))?,
            y: y
                .trim()
                .parse()
                .map_err(|_| GatewayError::invalid("y", "must be an integer pixel offset"))?,
        },
        (Some(_), None) => return Err(GatewayError::MissingParameter("y")),
        (None, Some(_)) => return Err(GatewayError::MissingParameter("x")),
        (None, None) => match params.get("position") {
            Some(position) if !position.trim().is_empty() => {
                Anchor::Gravity(parse_choice::<Gravity>("position", position, &Gravity::NAMES)?)
            }
            _ => preset_anchor,
        },
    };

    Ok(WatermarkSpec::from_percentages(
        parse_percent(params.get("size"), preset.size),
        parse_percent(params.get("opacity"), preset.opacity),
        anchor,
        preset.padding,
    ))
}

/// Resolve the output `format` parameter, defaulting to the preset's.
pub fn resolve_format(
    params: &QueryParams,
    preset: &WatermarkPreset,
) -> Result<OutputFormat, GatewayError> {
    match params.get("format") {
        Some(format) if !format.trim().is_empty() => {
            parse_choice("format", format, &OutputFormat::NAMES)
        }
        _ => Ok(preset.format),
    }
}
