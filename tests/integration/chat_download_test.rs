// Chat and audio downloader endpoints

use super::test_harness::*;
use kagami::metadata::MetadataStore;
use serde_json::json;

#[tokio::test]
async fn test_chat_extracts_reply_from_nested_json() {
    let gateway = TestGateway::small().await;
    gateway.upstream.reply(
        "https://chat.test/",
        json_reply(json!({
            "choices": [{"message": {"content": "Hello there"}}]
        })),
    );

    let response = gateway.get("/api/ai/chat?prompt=hi%20bot").await;

    assert_eq!(response.status, 200);
    let body = json(&response);
    assert_eq!(body["status"], true);
    assert_eq!(body["creator"], "kagami-test");
    assert_eq!(body["result"]["prompt"], "hi bot");
    assert_eq!(body["result"]["reply"], "Hello there");
    assert_eq!(
        gateway.upstream.urls(),
        vec!["https://chat.test/api?q=hi%20bot".to_string()]
    );
    // Chat results are not persisted
    assert_eq!(gateway.metadata.artifact_count(), 0);
}

#[tokio::test]
async fn test_chat_accepts_plain_text_providers() {
    let gateway = TestGateway::small().await;
    gateway
        .upstream
        .reply("https://chat.test/", binary_reply("text/plain", "  plain answer \n"));

    let response = gateway.get("/api/ai/chat?prompt=hi").await;

    assert_eq!(response.status, 200);
    assert_eq!(json(&response)["result"]["reply"], "plain answer");
}

#[tokio::test]
async fn test_chat_without_reply_field_is_contract_error() {
    let gateway = TestGateway::small().await;
    gateway
        .upstream
        .reply("https://chat.test/", json_reply(json!({"unexpected": 1})));

    let response = gateway.get("/api/ai/chat?prompt=hi").await;

    assert_eq!(response.status, 502);
    assert!(json(&response)["error"]
        .as_str()
        .unwrap()
        .contains("unexpected provider response"));
}

#[tokio::test]
async fn test_chat_requires_prompt() {
    let gateway = TestGateway::small().await;

    let response = gateway.get("/api/ai/chat?prompt=%20%20").await;

    assert_eq!(response.status, 400);
    assert_eq!(gateway.upstream.calls(), 0);
}

fn script_downloader(gateway: &TestGateway) {
    gateway.upstream.reply(
        "https://audio.test/info",
        json_reply(json!({
            "status": true,
            "result": {
                "title": "Song",
                "author": "Band",
                "audio": "https://media.test/song.mp3",
                "thumbnail": "https://media.test/cover.jpg"
            }
        })),
    );
    gateway.upstream.reply(
        "https://media.test/song.mp3",
        binary_reply("audio/mpeg", &b"ID3 fake mp3 frames"[..]),
    );
}

#[tokio::test]
async fn test_audio_download_stores_audio_and_cover() {
    let gateway = TestGateway::small().await;
    script_downloader(&gateway);
    let cover = solid_png(8, 8, [1, 2, 3, 255]);
    gateway
        .upstream
        .reply("https://media.test/cover.jpg", binary_reply("image/png", cover.clone()));

    let response = gateway
        .get("/api/download/audio?url=https%3A%2F%2Fvideo.test%2Fwatch%3Fv%3D42")
        .await;

    assert_eq!(response.status, 200);
    let result = json(&response)["result"].clone();
    assert_eq!(result["title"], "Song");
    assert_eq!(result["author"], "Band");
    let id = result["id"].as_str().unwrap().to_string();
    assert_eq!(result["audio_url"], format!("/api/result/audio/{}", id));
    assert_eq!(result["cover_url"], format!("/api/result/cover/{}", id));

    assert_eq!(
        gateway.upstream.urls()[0],
        "https://audio.test/info?url=https%3A%2F%2Fvideo.test%2Fwatch%3Fv%3D42"
    );

    let audio = gateway.get(&format!("/api/result/audio/{}", id)).await;
    assert_eq!(audio.status, 200);
    assert_eq!(audio.content_type(), Some("audio/mpeg"));
    assert_eq!(&audio.body[..], b"ID3 fake mp3 frames");

    let stored_cover = gateway.get(&format!("/api/result/cover/{}", id)).await;
    assert_eq!(stored_cover.status, 200);
    assert_eq!(stored_cover.content_type(), Some("image/png"));
    assert_eq!(&stored_cover.body[..], &cover[..]);

    let record = gateway.metadata.get_artifact(&id).await.unwrap().unwrap();
    assert_eq!(record.thumbnail.as_deref(), Some("https://media.test/cover.jpg"));
}

#[tokio::test]
async fn test_audio_download_survives_cover_failure() {
    let gateway = TestGateway::small().await;
    script_downloader(&gateway);
    gateway
        .upstream
        .reply("https://media.test/cover.jpg", status_reply(404, "gone"));

    let response = gateway
        .get("/api/download/audio?url=https://video.test/watch")
        .await;

    assert_eq!(response.status, 200);
    let result = json(&response)["result"].clone();
    assert!(result["cover_url"].is_null());
    let id = result["id"].as_str().unwrap();

    assert_eq!(
        gateway.get(&format!("/api/result/audio/{}", id)).await.status,
        200
    );
    assert_eq!(
        gateway.get(&format!("/api/result/cover/{}", id)).await.status,
        404
    );
}

#[tokio::test]
async fn test_audio_download_without_audio_link_fails() {
    let gateway = TestGateway::small().await;
    gateway.upstream.reply(
        "https://audio.test/info",
        json_reply(json!({"title": "Song"})),
    );

    let response = gateway
        .get("/api/download/audio?url=https://video.test/watch")
        .await;

    assert_eq!(response.status, 502);
    assert_eq!(gateway.metadata.artifact_count(), 0);
}

#[tokio::test]
async fn test_audio_download_rejects_non_http_source() {
    let gateway = TestGateway::small().await;

    let response = gateway.get("/api/download/audio?url=not-a-url").await;

    assert_eq!(response.status, 400);
    assert_eq!(gateway.upstream.calls(), 0);
}
