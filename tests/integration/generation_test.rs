// Image generation endpoints: text2img (binary) and imagine (redirect)

use super::test_harness::*;
use kagami::metadata::MetadataStore;
use serde_json::json;

#[tokio::test]
async fn test_text2img_returns_webp_retrievable_by_id() {
    let gateway = TestGateway::new().await;

    let response = gateway.get("/api/ai/text2img?prompt=sunset").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("image/webp"));
    assert_eq!(response.header("Cache-Control"), Some("no-store"));
    let id = result_id(&response);
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(
        response.header("X-Result-URL"),
        Some(format!("/api/result/image/{}", id).as_str())
    );

    let image = decode(&response.body);
    assert_eq!(image.dimensions(), (1024, 1024));

    assert_eq!(
        gateway.upstream.urls(),
        vec!["https://image.test/prompt/sunset?width=1024&height=1024".to_string()]
    );

    let stored = gateway
        .get(&format!("/api/result/image/{}", id))
        .await;
    assert_eq!(stored.status, 200);
    assert_eq!(stored.body, response.body);
    assert_eq!(stored.content_type(), Some("image/webp"));
    assert_eq!(
        stored.header("Cache-Control"),
        Some("public, max-age=31536000, immutable")
    );
}

#[tokio::test]
async fn test_text2img_places_watermark_at_southeast() {
    let gateway = TestGateway::new().await;

    let response = gateway
        .get("/api/ai/text2img?prompt=sunset&position=southeast&size=25&opacity=50")
        .await;
    assert_eq!(response.status, 200);
    let image = decode(&response.body);

    // 200x100 logo scaled to 25% of 1024 wide: 256x128, inset by 20px
    let (left, top) = (1024 - 256 - 20, 1024 - 128 - 20);

    let inside = image.get_pixel(left + 128, top + 64);
    assert!(inside[0] >= 250, "red channel {:?}", inside);
    assert!(
        (115..=140).contains(&inside[1]),
        "half-transparent red over white, got {:?}",
        inside
    );

    for (x, y) in [(left - 8, top + 64), (left + 128, top - 8), (10, 10)] {
        assert_eq!(
            image.get_pixel(x, y).0,
            [255, 255, 255, 255],
            "pixel ({}, {}) outside the watermark",
            x,
            y
        );
    }
}

#[tokio::test]
async fn test_text2img_records_artifact_metadata() {
    let gateway = TestGateway::new().await;

    let response = gateway
        .get("/api/ai/text2img?prompt=a%20red%20fox&width=512&height=5000&user=u-7")
        .await;
    assert_eq!(response.status, 200);

    let record = gateway
        .metadata
        .get_artifact(&result_id(&response))
        .await
        .unwrap()
        .expect("record written");
    assert_eq!(record.endpoint, "text2img");
    assert_eq!(record.params["prompt"], "a red fox");
    assert_eq!(record.params["width"], 512);
    assert_eq!(record.params["height"], 2048);
    assert_eq!(record.params["watermark"]["opacity"], 42);
    assert_eq!(record.title.as_deref(), Some("a red fox"));
    assert!(record.primary_path.ends_with(".webp"));
    assert!(record.secondary_path.is_none());
}

#[tokio::test]
async fn test_missing_prompt_never_reaches_upstream() {
    let gateway = TestGateway::new().await;

    let response = gateway.get("/api/ai/text2img?width=512").await;

    assert_eq!(response.status, 400);
    let body = json(&response);
    assert_eq!(body["status"], false);
    assert_eq!(body["creator"], "kagami-test");
    assert!(body["error"].as_str().unwrap().contains("prompt"));

    assert_eq!(gateway.upstream.calls(), 0);
    assert_eq!(gateway.metadata.artifact_count(), 0);
    // Only the watermark asset is in the blob store
    assert_eq!(gateway.blobs.len(), 1);

    let counters = gateway.counters().await;
    assert_eq!(counters.total_requests, 1);
    assert_eq!(counters.total_errors, 1);
    assert_eq!(counters.total_success, 0);
    assert_eq!(counters.total_visitors, 0);
}

#[tokio::test]
async fn test_invalid_position_echoes_allowed_values() {
    let gateway = TestGateway::new().await;

    let response = gateway
        .get("/api/ai/text2img?prompt=sunset&position=upside-down")
        .await;

    assert_eq!(response.status, 400);
    let body = json(&response);
    let allowed = body["allowed"].as_array().expect("allowed values");
    assert!(allowed.contains(&json!("southeast")));
    assert!(allowed.contains(&json!("center")));
    assert_eq!(gateway.upstream.calls(), 0);
}

#[tokio::test]
async fn test_provider_json_pointing_at_image_is_followed() {
    let gateway = TestGateway::small().await;
    gateway.upstream.reply(
        "https://image.test/prompt/",
        json_reply(json!({"status": true, "data": {"url": "https://cdn.test/img.png"}})),
    );

    let response = gateway.get("/api/ai/text2img?prompt=sunset").await;

    assert_eq!(response.status, 200);
    let urls = gateway.upstream.urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[1], "https://cdn.test/img.png");
}

#[tokio::test]
async fn test_provider_empty_error_field_is_not_a_failure() {
    let gateway = TestGateway::small().await;
    gateway.upstream.reply(
        "https://image.test/prompt/",
        json_reply(json!({"error": "", "url": "https://cdn.test/img.png"})),
    );

    let response = gateway.get("/api/ai/text2img?prompt=sunset").await;

    assert_eq!(response.status, 200);
    assert_eq!(gateway.metadata.artifact_count(), 1);
}

#[tokio::test]
async fn test_provider_reported_failure_is_bad_gateway() {
    let gateway = TestGateway::new().await;
    gateway.upstream.reply(
        "https://image.test/prompt/",
        json_reply(json!({"status": false, "message": "prompt rejected"})),
    );

    let response = gateway.get("/api/ai/text2img?prompt=sunset").await;

    assert_eq!(response.status, 502);
    assert!(json(&response)["error"]
        .as_str()
        .unwrap()
        .contains("prompt rejected"));
    assert_eq!(gateway.metadata.artifact_count(), 0);

    let counters = gateway.counters().await;
    assert_eq!(counters.total_errors, 1);
}

#[tokio::test]
async fn test_upstream_error_status_is_bad_gateway() {
    let gateway = TestGateway::new().await;
    gateway
        .upstream
        .reply("https://image.test/prompt/", status_reply(500, "boom"));

    let response = gateway.get("/api/ai/text2img?prompt=sunset").await;

    assert_eq!(response.status, 502);
    assert!(json(&response)["error"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn test_provider_html_instead_of_image_is_bad_gateway() {
    let gateway = TestGateway::small().await;
    gateway.upstream.reply(
        "https://image.test/prompt/",
        binary_reply("text/html", &b"<html>rate limited</html>"[..]),
    );

    let response = gateway.get("/api/ai/text2img?prompt=sunset").await;

    assert_eq!(response.status, 502);
    assert!(json(&response)["error"]
        .as_str()
        .unwrap()
        .starts_with("unexpected provider response"));
    assert_eq!(gateway.metadata.artifact_count(), 0);

    let metrics = gateway.get("/metrics").await;
    let text = String::from_utf8(metrics.body.to_vec()).unwrap();
    assert!(text.contains(
        "kagami_upstream_errors_total{kind=\"contract\",provider=\"text2img\"} 1"
    ));
}

#[tokio::test]
async fn test_empty_provider_body_is_bad_gateway() {
    let gateway = TestGateway::small().await;
    gateway
        .upstream
        .reply("https://image.test/prompt/", binary_reply("image/png", &b""[..]));

    let response = gateway.get("/api/ai/text2img?prompt=sunset").await;

    assert_eq!(response.status, 502);
}

#[tokio::test]
async fn test_imagine_redirects_to_stored_result() {
    let gateway = TestGateway::small().await;

    let response = gateway
        .get("/api/ai/imagine/a%20cat&width=512&height=768")
        .await;

    assert_eq!(response.status, 302);
    let location = response.header("Location").expect("Location").to_string();
    let id = location
        .strip_prefix("/api/result/image/")
        .expect("redirects to the retrieval path");

    assert_eq!(
        gateway.upstream.urls(),
        vec!["https://image.test/imagine/a%20cat?width=512&height=768".to_string()]
    );

    let stored = gateway.get(&location).await;
    assert_eq!(stored.status, 200);
    assert_eq!(stored.content_type(), Some("image/png"));

    let record = gateway.metadata.get_artifact(id).await.unwrap().unwrap();
    assert_eq!(record.params["prompt"], "a cat");
    assert_eq!(record.params["watermark"]["opacity"], 30);
}

#[tokio::test]
async fn test_imagine_query_wins_over_legacy_segment() {
    let gateway = TestGateway::small().await;

    let response = gateway
        .get("/api/ai/imagine/cat&width=512?width=640")
        .await;

    assert_eq!(response.status, 302);
    assert_eq!(
        gateway.upstream.urls(),
        vec!["https://image.test/imagine/cat?width=640&height=1024".to_string()]
    );
}

#[tokio::test]
async fn test_imagine_failure_redirects_to_error_page() {
    let gateway = TestGateway::new().await;
    gateway
        .upstream
        .reply("https://image.test/imagine/", status_reply(503, "overloaded"));

    let response = gateway.get("/api/ai/imagine/sunset").await;

    assert_eq!(response.status, 302);
    let location = response.header("Location").unwrap();
    assert!(location.starts_with("/error?status=502&message="), "{}", location);
    assert!(location.ends_with("&from=imagine"), "{}", location);

    let counters = gateway.counters().await;
    assert_eq!(counters.total_errors, 1);
    assert_eq!(counters.total_success, 0);
}
