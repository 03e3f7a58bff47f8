//! Watermark compositor.
//!
//! Scales a watermark relative to the base image, attenuates its alpha
//! channel by the requested opacity and blends it "over" the base at the
//! anchored position.
//!
//! # Example
//!
//! ```ignore
//! use kagami::watermark::{composite, OutputFormat, WatermarkSpec};
//!
//! let spec = WatermarkSpec::from_percentages(25, 50, Anchor::Auto, 20);
//! let out = composite(&base_bytes, &logo_bytes, &spec, OutputFormat::WebP)?;
//! ```

use image::{Rgba, RgbaImage};

use super::codec::{decode_image, encode_rgba, resize_rgba, OutputFormat};
use super::position::{
    calculate_position, clamp_to_bounds, is_visible, ImageDimensions, PlacementPosition,
    WatermarkDimensions,
};
use super::{WatermarkError, WatermarkSpec};

/// A watermark layer ready to be blended onto a target.
#[derive(Clone)]
pub struct WatermarkLayer {
    /// The watermark image (RGBA), already scaled and alpha-attenuated.
    pub image: RgbaImage,
    /// Top-left corner on the target.
    pub position: PlacementPosition,
}

impl std::fmt::Debug for WatermarkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkLayer")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("position", &self.position)
            .finish()
    }
}

/// Result of a composition.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

impl ComposedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Composite `watermark` onto `base` and encode the result.
///
/// Pure: identical inputs always produce byte-identical output.
pub fn composite(
    base: &[u8],
    watermark: &[u8],
    spec: &WatermarkSpec,
    format: OutputFormat,
) -> Result<ComposedImage, WatermarkError> {
    // Both buffers are checked before either is handed to the decoder
    if base.is_empty() {
        return Err(WatermarkError::EmptyInput("base"));
    }
    if watermark.is_empty() {
        return Err(WatermarkError::EmptyInput("watermark"));
    }

    let mut target = decode_image(base, "base")?.to_rgba8();
    let mark = decode_image(watermark, "watermark")?.to_rgba8();

    let layer = prepare_layer(&target, &mark, spec)?;
    blend_layer(&mut target, &layer);

    let data = encode_rgba(&target, format)?;
    Ok(ComposedImage {
        data,
        width: target.width(),
        height: target.height(),
        format,
    })
}

/// Scale, attenuate and position a watermark for the given target.
pub fn prepare_layer(
    target: &RgbaImage,
    mark: &RgbaImage,
    spec: &WatermarkSpec,
) -> Result<WatermarkLayer, WatermarkError> {
    let image_dims = ImageDimensions {
        width: target.width(),
        height: target.height(),
    };

    let (wm_w, wm_h) = scaled_dimensions(
        (mark.width(), mark.height()),
        (target.width(), target.height()),
        spec.size_fraction,
    )?;

    let mut scaled = resize_rgba(mark, wm_w, wm_h)?;
    apply_opacity(&mut scaled, spec.opacity);

    let wm_dims = WatermarkDimensions {
        width: wm_w,
        height: wm_h,
    };
    let raw = calculate_position(spec.anchor, &image_dims, &wm_dims, spec.padding);
    let position = clamp_to_bounds(raw, &image_dims, &wm_dims);

    Ok(WatermarkLayer {
        image: scaled,
        position,
    })
}

/// Compute watermark dimensions for a base image.
///
/// Width is `fraction x base width`; height follows the watermark's aspect
/// ratio. If that is taller than the base, the watermark is refit to the
/// base height instead, again keeping the aspect ratio.
pub fn scaled_dimensions(
    watermark: (u32, u32),
    base: (u32, u32),
    fraction: f32,
) -> Result<(u32, u32), WatermarkError> {
    let (src_w, src_h) = watermark;
    let (base_w, base_h) = base;
    if src_w == 0 || src_h == 0 || base_w == 0 || base_h == 0 {
        return Err(WatermarkError::CompositeError(format!(
            "degenerate dimensions: watermark {}x{}, base {}x{}",
            src_w, src_h, base_w, base_h
        )));
    }

    let fraction = fraction.clamp(0.01, 1.0) as f64;
    let aspect = src_h as f64 / src_w as f64;

    let mut width = ((base_w as f64 * fraction).round() as u32).max(1);
    let mut height = ((width as f64 * aspect).round() as u32).max(1);

    if height > base_h {
        height = base_h;
        width = ((base_h as f64 / aspect).round() as u32).clamp(1, base_w);
    }

    Ok((width, height))
}

/// Multiply every pixel's alpha by `opacity` (0.0 to 1.0).
pub fn apply_opacity(image: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity >= 1.0 {
        return;
    }
    for pixel in image.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * opacity).round() as u8;
    }
}

/// Blend a single watermark layer onto the target image.
pub fn blend_layer(target: &mut RgbaImage, layer: &WatermarkLayer) {
    let image_dims = ImageDimensions {
        width: target.width(),
        height: target.height(),
    };
    let wm_dims = WatermarkDimensions {
        width: layer.image.width(),
        height: layer.image.height(),
    };
    if !is_visible(layer.position, &image_dims, &wm_dims) {
        return;
    }

    let target_width = target.width() as i32;
    let target_height = target.height() as i32;

    // Visible region, clipped to the target
    let x_start = layer.position.x.max(0);
    let y_start = layer.position.y.max(0);
    let x_end = (layer.position.x + wm_dims.width as i32).min(target_width);
    let y_end = (layer.position.y + wm_dims.height as i32).min(target_height);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let wx = (tx - layer.position.x) as u32;
            let wy = (ty - layer.position.y) as u32;

            let wm_pixel = *layer.image.get_pixel(wx, wy);
            let target_pixel = *target.get_pixel(tx as u32, ty as u32);

            target.put_pixel(tx as u32, ty as u32, blend_pixels(target_pixel, wm_pixel));
        }
    }
}

/// Porter-Duff "over": result = fg + bg * (1 - fg.alpha)
pub fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>) -> Rgba<u8> {
    let fg_alpha = foreground[3] as f32 / 255.0;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
