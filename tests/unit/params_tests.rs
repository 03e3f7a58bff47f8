// Parameter resolution tests across query strings, legacy segments and presets

use kagami::config::WatermarkPreset;
use kagami::error::GatewayError;
use kagami::params::*;
use kagami::responder::EndpointResponse;
use kagami::watermark::{Anchor, Gravity, OutputFormat};

fn preset(opacity: u8) -> WatermarkPreset {
    let mut preset = WatermarkPreset::new("store://assets/logo.png");
    preset.opacity = opacity;
    preset
}

/// Merge a legacy path segment into the query the way the imagine route does.
fn merged(segment: &str, query: Option<&str>) -> QueryParams {
    let (prompt, pairs) = split_legacy_segment(segment);
    let mut params = QueryParams::parse(query);
    for (key, value) in pairs {
        params.insert_missing(key, value);
    }
    params.set("prompt", prompt);
    params
}

#[test]
fn test_legacy_segment_supplies_dimensions() {
    let params = merged("a%20red%20fox&width=512&height=768", None);
    let generation = GenerationParams::resolve(&params).unwrap();

    assert_eq!(generation.prompt, "a red fox");
    assert_eq!((generation.width, generation.height), (512, 768));
}

#[test]
fn test_query_beats_legacy_segment() {
    let params = merged("fox&width=512", Some("width=640&height=480"));
    let generation = GenerationParams::resolve(&params).unwrap();

    assert_eq!((generation.width, generation.height), (640, 480));
}

#[test]
fn test_path_prompt_beats_query_prompt() {
    let params = merged("from-path", Some("prompt=from-query"));

    assert_eq!(params.get("prompt"), Some("from-path"));
}

#[test]
fn test_blank_legacy_prompt_is_missing() {
    let params = merged("%20&width=512", None);

    assert!(matches!(
        GenerationParams::resolve(&params),
        Err(GatewayError::MissingParameter("prompt"))
    ));
}

#[test]
fn test_out_of_range_values_are_clamped_not_rejected() {
    let params = QueryParams::parse(Some("prompt=x&width=-20&height=1e9&size=0&opacity=400"));
    let generation = GenerationParams::resolve(&params).unwrap();
    let spec = resolve_watermark(&params, &preset(42)).unwrap();

    assert!(generation.width >= 1 && generation.width < 1024);
    assert!(generation.height > 1024);
    assert!((spec.size_fraction - 0.01).abs() < 1e-6);
    assert!((spec.opacity - 1.0).abs() < 1e-6);
}

#[test]
fn test_presets_supply_distinct_defaults() {
    let none = QueryParams::default();

    let text2img = resolve_watermark(&none, &preset(42)).unwrap();
    let imagine = resolve_watermark(&none, &preset(30)).unwrap();

    assert!((text2img.opacity - 0.42).abs() < 1e-6);
    assert!((imagine.opacity - 0.30).abs() < 1e-6);
    assert_eq!(text2img.padding, 20);
}

#[test]
fn test_position_aliases_resolve_to_gravity() {
    for (alias, gravity) in [
        ("se", Gravity::SouthEast),
        ("top-left", Gravity::NorthWest),
        ("CENTER", Gravity::Center),
        ("bottom", Gravity::South),
    ] {
        let params = QueryParams::parse(Some(&format!("position={}", alias)));
        let spec = resolve_watermark(&params, &preset(42)).unwrap();
        assert_eq!(spec.anchor, Anchor::Gravity(gravity), "alias {}", alias);
    }
}

#[test]
fn test_preset_position_is_used_when_request_is_silent() {
    let mut placed = preset(42);
    placed.position = Some("northeast".to_string());

    let spec = resolve_watermark(&QueryParams::default(), &placed).unwrap();
    assert_eq!(spec.anchor, Anchor::Gravity(Gravity::NorthEast));

    let blank = QueryParams::parse(Some("position="));
    let spec = resolve_watermark(&blank, &placed).unwrap();
    assert_eq!(spec.anchor, Anchor::Gravity(Gravity::NorthEast));
}

#[test]
fn test_negative_offsets_are_accepted() {
    let params = QueryParams::parse(Some("x=-15&y=%2B30"));
    let spec = resolve_watermark(&params, &preset(42)).unwrap();

    assert_eq!(spec.anchor, Anchor::Offset { x: -15, y: 30 });
}

#[test]
fn test_invalid_choice_reaches_the_envelope() {
    let params = QueryParams::parse(Some("position=diagonal"));
    let err = resolve_watermark(&params, &preset(42)).unwrap_err();
    assert_eq!(err.status_code(), 400);

    let response = EndpointResponse::error_envelope("kagami", &err);
    let body = response.json_body().unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(body["status"], false);
    assert_eq!(body["allowed"].as_array().unwrap().len(), 9);
    assert!(body["error"].as_str().unwrap().contains("position"));
}

#[test]
fn test_format_choice() {
    let webp = QueryParams::parse(Some("format=WEBP"));
    assert_eq!(resolve_format(&webp, &preset(42)).unwrap(), OutputFormat::WebP);

    let mut png_preset = preset(30);
    png_preset.format = OutputFormat::Png;
    assert_eq!(
        resolve_format(&QueryParams::default(), &png_preset).unwrap(),
        OutputFormat::Png
    );

    let jpeg = QueryParams::parse(Some("format=jpeg"));
    let err = resolve_format(&jpeg, &preset(42)).unwrap_err();
    assert_eq!(
        err.allowed_values().unwrap(),
        vec!["webp".to_string(), "png".to_string()]
    );
}

#[test]
fn test_params_record_round_trips_to_json() {
    let params = merged("neon%20city&width=800", Some("opacity=25"));
    let json = params.to_json();

    assert_eq!(json["prompt"], "neon city");
    assert_eq!(json["width"], "800");
    assert_eq!(json["opacity"], "25");
}
