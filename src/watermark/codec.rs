//! Decode, resize and encode helpers for the composition engine.
//!
//! Encoders are lossless so that composition stays a pure function of its
//! inputs: the same pixels always produce the same bytes.

use std::fmt;
use std::io::Cursor;
use std::num::NonZeroU32;
use std::str::FromStr;

use fast_image_resize::{FilterType, Image, MulDiv, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageEncoder as _, RgbaImage};
use serde::{Deserialize, Serialize};

use super::WatermarkError;

/// Output format of a composited image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    WebP,
    Png,
}

impl OutputFormat {
    pub const NAMES: [&'static str; 2] = ["webp", "png"];

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "webp" => Ok(OutputFormat::WebP),
            "png" => Ok(OutputFormat::Png),
            other => Err(WatermarkError::ConfigError(format!(
                "unsupported output format: {}",
                other
            ))),
        }
    }
}

/// Decode an image buffer, guessing the format from its magic bytes.
pub fn decode_image(data: &[u8], role: &'static str) -> Result<DynamicImage, WatermarkError> {
    if data.is_empty() {
        return Err(WatermarkError::EmptyInput(role));
    }

    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| WatermarkError::DecodeError {
            role,
            message: e.to_string(),
        })?
        .decode()
        .map_err(|e| WatermarkError::DecodeError {
            role,
            message: e.to_string(),
        })
}

/// Resize an RGBA image to exactly `target_w` x `target_h` (Lanczos3).
pub fn resize_rgba(
    img: &RgbaImage,
    target_w: u32,
    target_h: u32,
) -> Result<RgbaImage, WatermarkError> {
    if img.width() == target_w && img.height() == target_h {
        return Ok(img.clone());
    }

    let src_width = NonZeroU32::new(img.width())
        .ok_or_else(|| WatermarkError::ResizeError("source width is 0".to_string()))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| WatermarkError::ResizeError("source height is 0".to_string()))?;
    let dst_width = NonZeroU32::new(target_w)
        .ok_or_else(|| WatermarkError::ResizeError("target width is 0".to_string()))?;
    let dst_height = NonZeroU32::new(target_h)
        .ok_or_else(|| WatermarkError::ResizeError("target height is 0".to_string()))?;

    let mut src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.as_raw().clone(),
        PixelType::U8x4,
    )
    .map_err(|e| WatermarkError::ResizeError(format!("invalid source buffer: {:?}", e)))?;

    // Convolve premultiplied colour so transparent texels do not bleed
    // their RGB into the visible edge
    let alpha = MulDiv::default();
    alpha
        .multiply_alpha_inplace(&mut src_image.view_mut())
        .map_err(|e| WatermarkError::ResizeError(format!("{:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| WatermarkError::ResizeError(format!("{:?}", e)))?;

    alpha
        .divide_alpha_inplace(&mut dst_image.view_mut())
        .map_err(|e| WatermarkError::ResizeError(format!("{:?}", e)))?;

    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| WatermarkError::ResizeError("output buffer size mismatch".to_string()))
}

/// Encode an RGBA image to the requested format.
pub fn encode_rgba(img: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>, WatermarkError> {
    let mut output = Cursor::new(Vec::new());
    let (w, h) = img.dimensions();

    let result = match format {
        OutputFormat::WebP => image::codecs::webp::WebPEncoder::new_lossless(&mut output)
            .write_image(img.as_raw(), w, h, image::ColorType::Rgba8),
        OutputFormat::Png => image::codecs::png::PngEncoder::new(&mut output)
            .write_image(img.as_raw(), w, h, image::ColorType::Rgba8),
    };

    result.map_err(|e| WatermarkError::EncodeError {
        format: format.extension(),
        message: e.to_string(),
    })?;

    Ok(output.into_inner())
}
