//! Watermark error types.
//!
//! Defines errors that can occur while fetching watermark assets and
//! compositing them onto base images.

use thiserror::Error;

/// Errors that can occur during watermark processing.
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// A base or watermark buffer was empty. Raised before any decode.
    #[error("Empty {0} image buffer")]
    EmptyInput(&'static str),

    /// Failed to fetch watermark image from source
    #[error("Failed to fetch watermark: {0}")]
    FetchError(String),

    /// Failed to decode an image buffer. `role` is "base" or "watermark".
    #[error("Failed to decode {role} image: {message}")]
    DecodeError { role: &'static str, message: String },

    /// Failed to resize the watermark
    #[error("Failed to resize watermark: {0}")]
    ResizeError(String),

    /// Failed to encode the composited output
    #[error("Failed to encode {format} output: {message}")]
    EncodeError {
        format: &'static str,
        message: String,
    },

    /// Invalid configuration (unknown gravity, bad source, ...)
    #[error("Watermark configuration error: {0}")]
    ConfigError(String),

    /// Failed to composite watermark onto image
    #[error("Failed to composite watermark: {0}")]
    CompositeError(String),
}
