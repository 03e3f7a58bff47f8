//! Watermark presets and asset fetcher settings.
//!
//! Each watermarking endpoint has its own preset. Presets deliberately do
//! not share defaults: branding differs per product (for example 42% vs 30%
//! opacity and different source assets).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_WATERMARK_CACHE_ENTRIES,
    DEFAULT_WATERMARK_CACHE_TTL_SECS, DEFAULT_WATERMARK_OPACITY_PERCENT, DEFAULT_WATERMARK_PADDING,
    DEFAULT_WATERMARK_SIZE_PERCENT,
};
use crate::watermark::position::Gravity;
use crate::watermark::{Anchor, OutputFormat, WatermarkSpec};

fn default_size() -> u8 {
    DEFAULT_WATERMARK_SIZE_PERCENT
}

fn default_opacity() -> u8 {
    DEFAULT_WATERMARK_OPACITY_PERCENT
}

fn default_padding() -> u32 {
    DEFAULT_WATERMARK_PADDING
}

fn default_cache_entries() -> u64 {
    DEFAULT_WATERMARK_CACHE_ENTRIES
}

fn default_cache_ttl() -> u64 {
    DEFAULT_WATERMARK_CACHE_TTL_SECS
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

/// Per-endpoint watermark defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatermarkPreset {
    /// `store://key` or `https://...`
    pub source: String,
    /// Watermark width as a percentage of the base width
    #[serde(default = "default_size")]
    pub size: u8,
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    #[serde(default = "default_padding")]
    pub padding: u32,
    /// Gravity name; bottom-right offset placement when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl WatermarkPreset {
    /// Preset with default size, opacity, padding and format.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            size: default_size(),
            opacity: default_opacity(),
            padding: default_padding(),
            position: None,
            format: OutputFormat::default(),
        }
    }

    /// Default anchor of this preset.
    pub fn anchor(&self) -> Result<Anchor, String> {
        match &self.position {
            None => Ok(Anchor::Auto),
            Some(name) => name
                .parse::<Gravity>()
                .map(Anchor::Gravity)
                .map_err(|e| e.to_string()),
        }
    }

    /// The [`WatermarkSpec`] applied when a request overrides nothing.
    pub fn default_spec(&self) -> WatermarkSpec {
        WatermarkSpec::from_percentages(
            self.size,
            self.opacity,
            self.anchor().unwrap_or_default(),
            self.padding,
        )
    }
}

/// Settings for fetching watermark assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatermarkFetcherConfig {
    /// Keep decoded assets in memory between requests
    #[serde(default)]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_entries")]
    pub max_cache_entries: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for WatermarkFetcherConfig {
    fn default() -> Self {
        Self {
            cache_enabled: false,
            max_cache_entries: default_cache_entries(),
            cache_ttl_secs: default_cache_ttl(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WatermarkConfig {
    #[serde(default)]
    pub fetcher: WatermarkFetcherConfig,
    #[serde(default)]
    pub presets: BTreeMap<String, WatermarkPreset>,
}

impl WatermarkConfig {
    pub fn preset(&self, name: &str) -> Option<&WatermarkPreset> {
        self.presets.get(name)
    }
}
