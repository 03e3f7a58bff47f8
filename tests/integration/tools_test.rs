// Watermark tool: caller-supplied base image and logo

use super::test_harness::*;
use kagami::metadata::MetadataStore;

#[tokio::test]
async fn test_watermark_tool_with_caller_logo() {
    let gateway = TestGateway::small().await;
    gateway.upstream.reply(
        "https://logos.test/",
        binary_reply("image/png", solid_png(40, 40, [0, 0, 255, 255])),
    );

    let response = gateway
        .get("/api/tools/watermark?url=https%3A%2F%2Fphotos.test%2Fbeach.png&logo=https%3A%2F%2Flogos.test%2Fmark.png&position=northwest&size=50&opacity=100")
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("image/webp"));

    let mut urls = gateway.upstream.urls();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://logos.test/mark.png".to_string(),
            "https://photos.test/beach.png".to_string(),
        ]
    );

    // 50% of a 64px base is 32px, inset 20px from the top-left corner
    let image = decode(&response.body);
    assert_eq!(image.dimensions(), (64, 64));
    assert_eq!(image.get_pixel(30, 30).0, [0, 0, 255, 255]);
    assert_eq!(image.get_pixel(2, 2).0, [255, 255, 255, 255]);

    let record = gateway
        .metadata
        .get_artifact(&result_id(&response))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.endpoint, "watermark");
    assert_eq!(record.params["url"], "https://photos.test/beach.png");
}

#[tokio::test]
async fn test_watermark_tool_falls_back_to_preset_logo() {
    let gateway = TestGateway::small().await;

    let response = gateway
        .get("/api/tools/watermark?url=https://photos.test/beach.png&format=png")
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("image/png"));
    // The preset logo comes from the blob store, not the upstream
    assert_eq!(gateway.upstream.calls(), 1);
}

#[tokio::test]
async fn test_watermark_tool_requires_http_url() {
    let gateway = TestGateway::small().await;

    let missing = gateway.get("/api/tools/watermark").await;
    assert_eq!(missing.status, 400);
    assert!(json(&missing)["error"].as_str().unwrap().contains("url"));

    let not_http = gateway
        .get("/api/tools/watermark?url=file%3A%2F%2F%2Fetc%2Fpasswd")
        .await;
    assert_eq!(not_http.status, 400);

    let bad_logo = gateway
        .get("/api/tools/watermark?url=https://photos.test/a.png&logo=ftp://x/y.png")
        .await;
    assert_eq!(bad_logo.status, 400);
    assert!(json(&bad_logo)["error"].as_str().unwrap().contains("logo"));

    assert_eq!(gateway.upstream.calls(), 0);
}

#[tokio::test]
async fn test_watermark_tool_rejects_unknown_format() {
    let gateway = TestGateway::small().await;

    let response = gateway
        .get("/api/tools/watermark?url=https://photos.test/a.png&format=gif")
        .await;

    assert_eq!(response.status, 400);
    let body = json(&response);
    assert_eq!(body["allowed"], serde_json::json!(["webp", "png"]));
    assert_eq!(gateway.upstream.calls(), 0);
}

#[tokio::test]
async fn test_watermark_tool_undecodable_base_is_bad_gateway() {
    let gateway = TestGateway::small().await;
    gateway.upstream.reply(
        "https://photos.test/",
        binary_reply("image/png", &b"definitely not a png"[..]),
    );

    let response = gateway
        .get("/api/tools/watermark?url=https://photos.test/a.png")
        .await;

    assert_eq!(response.status, 502);
    let message = json(&response)["error"].as_str().unwrap().to_string();
    assert!(message.starts_with("unexpected provider response"));
    assert!(message.contains("base"));
    assert_eq!(gateway.metadata.artifact_count(), 0);
}
