// Configuration loading and validation tests

use kagami::config::*;
use kagami::watermark::{Anchor, Gravity, OutputFormat};

fn example_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.yaml")
}

fn load_example() -> Config {
    std::env::set_var("KAGAMI_ADMIN_SECRET", "example-secret");
    Config::from_file(example_path()).expect("Failed to load example config")
}

fn minimal_with(extra: &str) -> Config {
    let yaml = format!(
        r#"
server:
  address: "127.0.0.1"
  port: 8080
{}"#,
        extra
    );
    Config::from_yaml_with_env(&yaml).expect("Failed to parse YAML")
}

#[test]
fn test_example_config_loads_and_validates() {
    let config = load_example();

    assert!(config.validate().is_ok());
    assert_eq!(config.server.admin_secret.as_deref(), Some("example-secret"));
    assert_eq!(config.server.log_format, LogFormat::Json);
    assert_eq!(config.storage.backend, StorageBackend::S3);
    assert_eq!(config.metadata.backend, MetadataBackend::Redis);
    assert_eq!(config.quota.retention_days, 28);
    assert_eq!(config.providers.len(), 4);
}

#[test]
fn test_example_presets_keep_per_endpoint_branding() {
    let config = load_example();

    let text2img = config.watermark.preset("text2img").unwrap();
    let imagine = config.watermark.preset("imagine").unwrap();
    assert_eq!(text2img.opacity, 42);
    assert_eq!(imagine.opacity, 30);
    assert_eq!(text2img.format, OutputFormat::WebP);
    assert_eq!(imagine.format, OutputFormat::Png);
    assert_eq!(text2img.anchor().unwrap(), Anchor::Auto);
    assert_eq!(
        imagine.anchor().unwrap(),
        Anchor::Gravity(Gravity::SouthEast)
    );
    // Unset fields fall back to the defaults
    assert_eq!(imagine.size, 20);
    assert_eq!(imagine.padding, 20);
}

#[test]
fn test_example_chat_field_paths_override_defaults() {
    let config = load_example();
    let chat = config.provider("chat").unwrap();

    assert_eq!(
        chat.field_paths("result", &["ignored"]),
        vec!["result", "data.content", "choices.0.message.content"]
    );
    assert_eq!(chat.field_paths("title", &["title"]), vec!["title"]);
    assert_eq!(chat.timeout(), Some(std::time::Duration::from_secs(30)));
}

#[test]
fn test_server_defaults() {
    let config = minimal_with("");

    assert_eq!(config.server.threads, 4);
    assert_eq!(config.server.creator, "kagami");
    assert_eq!(config.server.error_page, "/error");
    assert!(config.server.trust_forwarded_for);
    assert!(config.server.admin_secret.is_none());
    assert_eq!(config.server.public_url("/api/result/image/ab"), "/api/result/image/ab");
}

#[test]
fn test_public_url_joins_base() {
    let config = minimal_with("");
    let mut server = config.server;
    server.public_base_url = Some("https://api.example.com/".to_string());

    assert_eq!(
        server.public_url("/api/result/image/ab"),
        "https://api.example.com/api/result/image/ab"
    );
}

#[test]
fn test_quota_scope() {
    let config = minimal_with(
        r#"
quota:
  guest_weekly_limit: 3
  endpoints: [text2img]
"#,
    );

    assert_eq!(config.quota.guest_weekly_limit, 3);
    assert!(config.quota.applies_to("text2img"));
    assert!(!config.quota.applies_to("chat"));

    let disabled = minimal_with("quota:\n  enabled: false\n");
    assert!(!disabled.quota.applies_to("text2img"));
}

#[test]
fn test_validate_rejects_relative_public_base_url() {
    let config = minimal_with("");
    let mut config = config;
    config.server.public_base_url = Some("api.example.com".to_string());

    assert!(config.validate().unwrap_err().contains("public_base_url"));
}

#[test]
fn test_validate_rejects_empty_admin_secret() {
    let mut config = minimal_with("");
    config.server.admin_secret = Some(String::new());

    assert!(config.validate().unwrap_err().contains("admin_secret"));
}

#[test]
fn test_validate_requires_paired_s3_credentials() {
    let config = minimal_with(
        r#"
storage:
  backend: s3
  s3:
    bucket: results
    access_key: AKIA
"#,
    );

    let err = config.validate().unwrap_err();
    assert!(err.contains("access_key"), "{}", err);
}

#[test]
fn test_validate_requires_redis_url() {
    let config = minimal_with("metadata:\n  backend: redis\n");

    assert!(config.validate().unwrap_err().contains("redis_url"));
}

#[test]
fn test_validate_rejects_unknown_preset_position() {
    let config = minimal_with(
        r#"
watermark:
  presets:
    watermark:
      source: "store://assets/logo.png"
      position: upside-down
"#,
    );

    assert!(config.validate().unwrap_err().contains("'watermark'"));
}

#[test]
fn test_validate_rejects_unsupported_preset_source() {
    let config = minimal_with(
        r#"
watermark:
  presets:
    watermark:
      source: "ftp://assets/logo.png"
"#,
    );

    assert!(config.validate().unwrap_err().contains("ftp://"));
}

#[test]
fn test_unknown_output_format_fails_to_parse() {
    let yaml = r#"
server:
  address: "127.0.0.1"
  port: 8080
watermark:
  presets:
    text2img:
      source: "store://assets/logo.png"
      format: gif
"#;

    assert!(Config::from_yaml_with_env(yaml).is_err());
}

#[test]
fn test_missing_file_is_reported() {
    let err = Config::from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}
