//! Position calculation for watermark placement.
//!
//! A watermark is anchored either to one of nine compass gravities, to an
//! explicit pixel offset, or automatically to the bottom-right corner
//! (`base - watermark - padding` on both axes).
//!
//! # Example
//!
//! ```
//! use kagami::watermark::position::{calculate_position, Anchor, Gravity, ImageDimensions, WatermarkDimensions};
//!
//! let image = ImageDimensions { width: 800, height: 600 };
//! let watermark = WatermarkDimensions { width: 100, height: 50 };
//!
//! let pos = calculate_position(Anchor::Gravity(Gravity::SouthEast), &image, &watermark, 20);
//! assert_eq!((pos.x, pos.y), (680, 530)); // 800 - 100 - 20, 600 - 50 - 20
//! ```

use std::fmt;
use std::str::FromStr;

use super::WatermarkError;

/// Dimensions of the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Dimensions of the watermark to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkDimensions {
    pub width: u32,
    pub height: u32,
}

/// A single position where a watermark should be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPosition {
    pub x: i32,
    pub y: i32,
}

impl PlacementPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Compass gravity for watermark anchoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    #[default]
    SouthEast,
}

impl Gravity {
    /// Canonical names accepted by the `position` parameter, in grid order.
    pub const NAMES: [&'static str; 9] = [
        "northwest",
        "north",
        "northeast",
        "west",
        "center",
        "east",
        "southwest",
        "south",
        "southeast",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gravity::NorthWest => "northwest",
            Gravity::North => "north",
            Gravity::NorthEast => "northeast",
            Gravity::West => "west",
            Gravity::Center => "center",
            Gravity::East => "east",
            Gravity::SouthWest => "southwest",
            Gravity::South => "south",
            Gravity::SouthEast => "southeast",
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gravity {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "northwest" | "nw" | "top-left" => Ok(Gravity::NorthWest),
            "north" | "n" | "top" => Ok(Gravity::North),
            "northeast" | "ne" | "top-right" => Ok(Gravity::NorthEast),
            "west" | "w" | "left" => Ok(Gravity::West),
            "center" | "centre" | "c" => Ok(Gravity::Center),
            "east" | "e" | "right" => Ok(Gravity::East),
            "southwest" | "sw" | "bottom-left" => Ok(Gravity::SouthWest),
            "south" | "s" | "bottom" => Ok(Gravity::South),
            "southeast" | "se" | "bottom-right" => Ok(Gravity::SouthEast),
            _ => Err(WatermarkError::ConfigError(format!("unknown gravity: {}", s))),
        }
    }
}

/// Where a watermark is anchored on the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    /// One of the nine compass points, inset by the padding.
    Gravity(Gravity),
    /// Explicit top-left pixel offset.
    Offset { x: i32, y: i32 },
    /// `base - watermark - padding` on both axes.
    #[default]
    Auto,
}

/// Calculate the top-left corner for a watermark placement.
///
/// Coordinates may be negative or overflow when the watermark is larger than
/// the image; run the result through [`clamp_to_bounds`] before blending.
pub fn calculate_position(
    anchor: Anchor,
    image: &ImageDimensions,
    watermark: &WatermarkDimensions,
    padding: u32,
) -> PlacementPosition {
    let img_w = image.width as i32;
    let img_h = image.height as i32;
    let wm_w = watermark.width as i32;
    let wm_h = watermark.height as i32;
    let p = padding as i32;

    let left = p;
    let h_center = (img_w - wm_w) / 2;
    let right = img_w - wm_w - p;
    let top = p;
    let v_center = (img_h - wm_h) / 2;
    let bottom = img_h - wm_h - p;

    match anchor {
        Anchor::Gravity(gravity) => match gravity {
            Gravity::NorthWest => PlacementPosition::new(left, top),
            Gravity::North => PlacementPosition::new(h_center, top),
            Gravity::NorthEast => PlacementPosition::new(right, top),
            Gravity::West => PlacementPosition::new(left, v_center),
            Gravity::Center => PlacementPosition::new(h_center, v_center),
            Gravity::East => PlacementPosition::new(right, v_center),
            Gravity::SouthWest => PlacementPosition::new(left, bottom),
            Gravity::South => PlacementPosition::new(h_center, bottom),
            Gravity::SouthEast => PlacementPosition::new(right, bottom),
        },
        Anchor::Offset { x, y } => PlacementPosition::new(x, y),
        Anchor::Auto => PlacementPosition::new(right, bottom),
    }
}

/// Clamp a position so the watermark lies entirely inside the image.
///
/// If the watermark is larger than the image on an axis the position on
/// that axis becomes 0.
pub fn clamp_to_bounds(
    position: PlacementPosition,
    image: &ImageDimensions,
    watermark: &WatermarkDimensions,
) -> PlacementPosition {
    let max_x = (image.width as i32 - watermark.width as i32).max(0);
    let max_y = (image.height as i32 - watermark.height as i32).max(0);

    PlacementPosition::new(position.x.clamp(0, max_x), position.y.clamp(0, max_y))
}

/// Check if any part of the watermark would be visible at the given position.
pub fn is_visible(
    position: PlacementPosition,
    image: &ImageDimensions,
    watermark: &WatermarkDimensions,
) -> bool {
    let wm_right = position.x + watermark.width as i32;
    let wm_bottom = position.y + watermark.height as i32;

    wm_right > 0
        && wm_bottom > 0
        && position.x < image.width as i32
        && position.y < image.height as i32
}
