// Constants module - centralized default values for configuration
//
// Defaults used by the config layer, the parameter resolver and the
// watermark pipeline live here so that the numbers appear exactly once.

// =============================================================================
// Server defaults
// =============================================================================

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default `creator` field stamped on every JSON envelope
pub const DEFAULT_CREATOR: &str = "kagami";

/// Default path of the browser-facing error page
pub const DEFAULT_ERROR_PAGE: &str = "/error";

/// Largest request body accepted by the admin endpoints (bytes)
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// Upstream defaults
// =============================================================================

/// Timeout applied to upstream calls that opt into one (seconds)
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Content type assumed when a provider omits the header
pub const DEFAULT_BINARY_CONTENT_TYPE: &str = "image/png";

/// Longest upstream message echoed back to clients
pub const MAX_UPSTREAM_MESSAGE_LEN: usize = 200;

// =============================================================================
// Parameter defaults
// =============================================================================

/// Default generated image edge (pixels)
pub const DEFAULT_IMAGE_DIMENSION: u32 = 1024;

/// Smallest accepted image edge (pixels)
pub const MIN_IMAGE_DIMENSION: u32 = 64;

/// Largest accepted image edge (pixels)
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

// =============================================================================
// Watermark defaults
// =============================================================================

/// Padding between the watermark and the base image edge (pixels)
pub const DEFAULT_WATERMARK_PADDING: u32 = 20;

/// Watermark width as a percentage of the base width
pub const DEFAULT_WATERMARK_SIZE_PERCENT: u8 = 20;

/// Watermark opacity percentage
pub const DEFAULT_WATERMARK_OPACITY_PERCENT: u8 = 50;

/// Maximum cached watermark assets when the fetcher cache is enabled
pub const DEFAULT_WATERMARK_CACHE_ENTRIES: u64 = 32;

/// TTL of cached watermark assets (seconds)
pub const DEFAULT_WATERMARK_CACHE_TTL_SECS: u64 = 3600;

// =============================================================================
// Storage defaults
// =============================================================================

/// Key prefix for artifact blobs
pub const DEFAULT_BLOB_KEY_PREFIX: &str = "results";

/// Key prefix for metadata rows
pub const DEFAULT_METADATA_KEY_PREFIX: &str = "kagami";

/// Default AWS region when none is configured
pub const DEFAULT_S3_REGION: &str = "us-east-1";

// =============================================================================
// Quota and accounting defaults
// =============================================================================

/// Guest requests allowed per IP per ISO week
pub const DEFAULT_GUEST_WEEKLY_LIMIT: u64 = 10;

/// Request log rows returned by the listing endpoint when no limit is given
pub const DEFAULT_LOG_PAGE_SIZE: usize = 50;

/// Upper bound on request log rows returned in one listing
pub const MAX_LOG_PAGE_SIZE: usize = 500;

/// Request log rows kept by the metadata store; older rows are dropped
pub const DEFAULT_REQUEST_LOG_RETENTION: usize = 10_000;

/// Cache-Control value for immutable artifact retrieval
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
