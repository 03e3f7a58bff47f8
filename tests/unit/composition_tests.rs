// Composition engine tests: placement, opacity and determinism

use std::io::Cursor;

use image::{ImageOutputFormat, Rgba, RgbaImage};
use kagami::watermark::{composite, Anchor, Gravity, OutputFormat, WatermarkError, WatermarkSpec};
use rstest::rstest;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png)
        .expect("encode test png");
    out.into_inner()
}

fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes)
        .expect("decode composed image")
        .to_rgba8()
}

fn spec(anchor: Anchor, opacity: f32) -> WatermarkSpec {
    WatermarkSpec {
        size_fraction: 0.2,
        anchor,
        opacity,
        padding: 10,
    }
}

/// 200x100 white base with a 40x20 red mark (0.2 of the width, unscaled).
fn compose(anchor: Anchor, opacity: f32) -> RgbaImage {
    let base = png(200, 100, WHITE);
    let mark = png(40, 20, RED);
    let out = composite(&base, &mark, &spec(anchor, opacity), OutputFormat::Png)
        .expect("composite");
    assert_eq!((out.width, out.height), (200, 100));
    decode(&out.data)
}

#[rstest]
#[case(Gravity::NorthWest, 10, 10)]
#[case(Gravity::North, 80, 10)]
#[case(Gravity::NorthEast, 150, 10)]
#[case(Gravity::West, 10, 40)]
#[case(Gravity::Center, 80, 40)]
#[case(Gravity::East, 150, 40)]
#[case(Gravity::SouthWest, 10, 70)]
#[case(Gravity::South, 80, 70)]
#[case(Gravity::SouthEast, 150, 70)]
fn test_gravity_places_mark_inside_padding(
    #[case] gravity: Gravity,
    #[case] left: u32,
    #[case] top: u32,
) {
    let out = compose(Anchor::Gravity(gravity), 1.0);

    // Interior of the mark is red
    assert_eq!(out.get_pixel(left + 20, top + 10).0, RED);
    // Just outside the mark stays white
    if left > 0 {
        assert_eq!(out.get_pixel(left - 1, top + 10).0, WHITE);
    }
    if top + 20 < 100 {
        assert_eq!(out.get_pixel(left + 20, top + 20).0, WHITE);
    }
}

#[test]
fn test_auto_anchor_matches_bottom_right_padding() {
    let auto = compose(Anchor::Auto, 1.0);
    let southeast = compose(Anchor::Gravity(Gravity::SouthEast), 1.0);
    assert_eq!(auto, southeast);
}

#[test]
fn test_offset_outside_the_image_is_clamped() {
    let out = compose(Anchor::Offset { x: 1000, y: -50 }, 1.0);

    // Clamped to (160, 0): flush with the top-right corner
    assert_eq!(out.get_pixel(199, 0).0, RED);
    assert_eq!(out.get_pixel(160, 19).0, RED);
    assert_eq!(out.get_pixel(159, 10).0, WHITE);
    assert_eq!(out.get_pixel(180, 20).0, WHITE);
}

#[test]
fn test_opacity_attenuates_monotonically() {
    let sample = |opacity: f32| {
        compose(Anchor::Gravity(Gravity::Center), opacity)
            .get_pixel(100, 50)
            .0
    };

    let faint = sample(0.1);
    let half = sample(0.5);
    let full = sample(1.0);

    // Red over white: only the green and blue channels move
    assert_eq!(faint[0], 255);
    assert!(faint[1] > half[1], "{:?} vs {:?}", faint, half);
    assert!(half[1] > full[1], "{:?} vs {:?}", half, full);
    assert_eq!(full, RED);
    assert!((120..=135).contains(&half[1]), "half opacity gave {:?}", half);
}

#[test]
fn test_tall_mark_is_refit_to_the_base_height() {
    let base = png(200, 100, WHITE);
    let pole = png(10, 100, RED);
    let full_width = WatermarkSpec {
        size_fraction: 1.0,
        anchor: Anchor::Gravity(Gravity::NorthWest),
        opacity: 1.0,
        padding: 0,
    };

    let out = composite(&base, &pole, &full_width, OutputFormat::Png).unwrap();
    let img = decode(&out.data);

    assert_eq!((img.width(), img.height()), (200, 100));
    assert_eq!(img.get_pixel(5, 99).0, RED);
    assert_eq!(img.get_pixel(15, 50).0, WHITE);
}

#[test]
fn test_composition_is_byte_deterministic() {
    let base = png(64, 64, [10, 20, 30, 255]);
    let mark = png(16, 16, [200, 100, 50, 180]);
    let spec = spec(Anchor::Gravity(Gravity::SouthWest), 0.42);

    for format in [OutputFormat::WebP, OutputFormat::Png] {
        let first = composite(&base, &mark, &spec, format).unwrap();
        let second = composite(&base, &mark, &spec, format).unwrap();
        assert_eq!(first.data, second.data, "{} output differs", format);
        assert_eq!(first.content_type(), format.content_type());
    }
}

#[test]
fn test_webp_output_decodes_to_the_same_pixels() {
    let base = png(32, 32, WHITE);
    let mark = png(8, 8, RED);
    let spec = spec(Anchor::Gravity(Gravity::Center), 1.0);

    let webp = composite(&base, &mark, &spec, OutputFormat::WebP).unwrap();
    let png_out = composite(&base, &mark, &spec, OutputFormat::Png).unwrap();

    assert_eq!(decode(&webp.data), decode(&png_out.data));
}

#[test]
fn test_empty_and_garbage_inputs_are_rejected() {
    let good = png(8, 8, WHITE);
    let spec = WatermarkSpec::default();

    assert!(matches!(
        composite(&[], &good, &spec, OutputFormat::Png),
        Err(WatermarkError::EmptyInput("base"))
    ));
    assert!(matches!(
        composite(&good, &[], &spec, OutputFormat::Png),
        Err(WatermarkError::EmptyInput("watermark"))
    ));
    assert!(matches!(
        composite(b"not an image", &good, &spec, OutputFormat::Png),
        Err(WatermarkError::DecodeError { role: "base", .. })
    ));
}
