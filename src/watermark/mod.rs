//! Image composition engine.
//!
//! Overlays a watermark asset onto a generated or caller-supplied image.
//! The policy for one request is a [`WatermarkSpec`]: relative size, anchor
//! and opacity. Per-endpoint defaults come from the `watermark.presets`
//! section of the configuration.
//!
//! # Configuration Example
//!
//! ```yaml
//! watermark:
//!   presets:
//!     text2img:
//!       source: "store://assets/logo.png"
//!       size: 20
//!       opacity: 42
//!       format: webp
//!     imagine:
//!       source: "https://cdn.example.com/mark.png"
//!       opacity: 30
//!       position: southeast
//!       format: png
//! ```

pub mod codec;
pub mod compositor;
pub mod error;
pub mod image_fetcher;
pub mod position;

pub use codec::OutputFormat;
pub use compositor::{composite, ComposedImage};
pub use error::WatermarkError;
pub use image_fetcher::{ImageFetcher, ImageSource};
pub use position::{Anchor, Gravity};

use bytes::Bytes;

use crate::constants::DEFAULT_WATERMARK_PADDING;

/// Per-request watermark policy. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkSpec {
    /// Watermark width as a fraction of the base width (0.01 to 1.0).
    pub size_fraction: f32,
    pub anchor: Anchor,
    /// Alpha multiplier (0.0 to 1.0).
    pub opacity: f32,
    /// Inset from the edges for gravity and auto anchors.
    pub padding: u32,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            size_fraction: 0.2,
            anchor: Anchor::Auto,
            opacity: 0.5,
            padding: DEFAULT_WATERMARK_PADDING,
        }
    }
}

impl WatermarkSpec {
    /// Build a spec from the 1-100 percentages used on the wire.
    pub fn from_percentages(size: u8, opacity: u8, anchor: Anchor, padding: u32) -> Self {
        Self {
            size_fraction: size.clamp(1, 100) as f32 / 100.0,
            anchor,
            opacity: opacity.clamp(1, 100) as f32 / 100.0,
            padding,
        }
    }
}

/// Run [`composite`] on the blocking pool.
pub async fn composite_blocking(
    base: Bytes,
    watermark: Bytes,
    spec: WatermarkSpec,
    format: OutputFormat,
) -> Result<ComposedImage, WatermarkError> {
    tokio::task::spawn_blocking(move || composite(&base, &watermark, &spec, format))
        .await
        .map_err(|e| WatermarkError::CompositeError(format!("composition task failed: {e}")))?
}
