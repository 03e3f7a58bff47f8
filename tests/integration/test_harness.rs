// Test harness: an in-process gateway with a scripted upstream
//
// `TestGateway` assembles `AppState` from in-memory stores and
// `StubUpstream`, then drives requests through `endpoints::handle` exactly
// as the Pingora proxy does.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use kagami::config::Config;
use kagami::endpoints::{self, IncomingRequest};
use kagami::metadata::{MemoryMetadataStore, MetadataStore, UsageCounters};
use kagami::responder::EndpointResponse;
use kagami::state::AppState;
use kagami::storage::{BlobStore, MemoryBlobStore};
use kagami::upstream::{TransportError, UpstreamClient, UpstreamRequest, UpstreamResponse};

pub const LOGO_KEY: &str = "assets/logo.png";
pub const ADMIN_SECRET: &str = "letmein";

/// Base image edge produced by the stub provider by default.
pub const BASE_EDGE: u32 = 1024;

pub const CONFIG_YAML: &str = r#"
server:
  address: "127.0.0.1"
  port: 8080
  creator: "kagami-test"
  admin_secret: "letmein"
providers:
  text2img:
    url: "https://image.test/prompt/{prompt}?width={width}&height={height}"
    timeout_secs: 5
  imagine:
    url: "https://image.test/imagine/{prompt}?width={width}&height={height}"
  chat:
    url: "https://chat.test/api?q={prompt}"
  audio_download:
    url: "https://audio.test/info?url={url}"
watermark:
  presets:
    text2img:
      source: "store://assets/logo.png"
      opacity: 42
      format: webp
    imagine:
      source: "store://assets/logo.png"
      opacity: 30
      format: png
    watermark:
      source: "store://assets/logo.png"
"#;

pub fn test_config() -> Config {
    let config = Config::from_yaml_with_env(CONFIG_YAML).expect("test config parses");
    config.validate().expect("test config is valid");
    config
}

/// Encode a single-colour RGBA image as PNG.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
        .expect("png encode");
    out
}

pub fn decode(bytes: &[u8]) -> image::RgbaImage {
    image::load_from_memory(bytes)
        .expect("response decodes as an image")
        .to_rgba8()
}

pub fn binary_reply(content_type: &str, body: impl Into<Bytes>) -> UpstreamResponse {
    UpstreamResponse {
        status: 200,
        content_type: Some(content_type.to_string()),
        body: body.into(),
    }
}

pub fn json_reply(value: serde_json::Value) -> UpstreamResponse {
    binary_reply("application/json", value.to_string())
}

pub fn status_reply(status: u16, body: &str) -> UpstreamResponse {
    UpstreamResponse {
        status,
        content_type: Some("text/plain".to_string()),
        body: Bytes::from(body.to_string()),
    }
}

/// Upstream client answering from a prefix table, recording every call.
pub struct StubUpstream {
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    replies: Mutex<Vec<(String, UpstreamResponse)>>,
    fallback: UpstreamResponse,
}

impl StubUpstream {
    /// Answers every unscripted URL with an opaque white square PNG.
    pub fn with_base_edge(edge: u32) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
            fallback: binary_reply("image/png", solid_png(edge, edge, [255, 255, 255, 255])),
        }
    }

    /// Answer URLs starting with `prefix` with `reply`. First match wins.
    pub fn reply(&self, prefix: &str, reply: UpstreamResponse) {
        self.replies.lock().push((prefix.to_string(), reply));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl UpstreamClient for StubUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(request.url.clone());
        let replies = self.replies.lock();
        Ok(replies
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

pub struct TestGateway {
    pub state: AppState,
    pub upstream: Arc<StubUpstream>,
    pub blobs: Arc<MemoryBlobStore>,
    pub metadata: Arc<MemoryMetadataStore>,
}

impl TestGateway {
    pub async fn new() -> Self {
        Self::build(test_config(), BASE_EDGE).await
    }

    /// Gateway whose provider returns small images, for request-heavy tests.
    pub async fn small() -> Self {
        Self::build(test_config(), 64).await
    }

    pub async fn build(config: Config, base_edge: u32) -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs
            .put(
                LOGO_KEY,
                Bytes::from(solid_png(200, 100, [255, 0, 0, 255])),
                "image/png",
            )
            .await
            .expect("logo upload");
        let metadata = Arc::new(MemoryMetadataStore::new());
        let upstream = Arc::new(StubUpstream::with_base_edge(base_edge));

        let state = AppState::from_parts(config, blobs.clone(), metadata.clone(), upstream.clone())
            .expect("state assembles");

        Self {
            state,
            upstream,
            blobs,
            metadata,
        }
    }

    pub async fn send(&self, request: IncomingRequest) -> EndpointResponse {
        endpoints::handle(&self.state, &request).await
    }

    pub async fn get(&self, path_and_query: &str) -> EndpointResponse {
        self.send(IncomingRequest::get(path_and_query)).await
    }

    /// Counters once every accounting event sent so far is applied.
    pub async fn counters(&self) -> UsageCounters {
        self.state.accountant.flush().await;
        self.metadata.counters().await.expect("counters")
    }
}

/// `X-Result-ID` of a fresh artifact response.
pub fn result_id(response: &EndpointResponse) -> String {
    response
        .header("X-Result-ID")
        .expect("X-Result-ID header")
        .to_string()
}

pub fn json(response: &EndpointResponse) -> serde_json::Value {
    response.json_body().expect("JSON body")
}
