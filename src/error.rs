// Error types module

use thiserror::Error;

use crate::metadata::MetadataError;
use crate::storage::StorageError;
use crate::watermark::WatermarkError;

/// Broad error classes reported in logs and the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ClientParameter,
    ServerControl,
    Upstream,
    Storage,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::ClientParameter => "client_parameter",
            ErrorClass::ServerControl => "server_control",
            ErrorClass::Upstream => "upstream",
            ErrorClass::Storage => "storage",
            ErrorClass::Internal => "internal",
        }
    }
}

/// Centralized error type for request handlers.
///
/// Every handler returns `Result<_, GatewayError>`; the responder turns the
/// error into an envelope or an error-page redirect with [`status_code`].
///
/// [`status_code`]: GatewayError::status_code
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid value for {name}: {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
        /// Accepted values, echoed back for enumerations
        allowed: Option<Vec<String>>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("forbidden")]
    Unauthorized,

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("weekly limit reached: {limit} requests per week for guests")]
    QuotaExceeded { limit: u64 },

    #[error("{0}")]
    Unavailable(String),

    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream timed out after {0}s")]
    UpstreamTimeout(u64),

    #[error("unexpected provider response: {0}")]
    ProviderContract(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Watermark(#[from] WatermarkError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        GatewayError::InvalidParameter {
            name,
            message: message.into(),
            allowed: None,
        }
    }

    pub fn invalid_choice(name: &'static str, value: &str, allowed: &[&str]) -> Self {
        GatewayError::InvalidParameter {
            name,
            message: format!("'{}' is not one of {}", value, allowed.join(", ")),
            allowed: Some(allowed.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MissingParameter(_) | GatewayError::InvalidParameter { .. } => 400,
            GatewayError::Unauthorized => 403,
            GatewayError::NotFound(_) => 404,
            GatewayError::MethodNotAllowed(_) => 405,
            GatewayError::QuotaExceeded { .. } => 429,
            GatewayError::Unavailable(_) => 503,
            GatewayError::Upstream { .. } | GatewayError::ProviderContract(_) => 502,
            GatewayError::UpstreamTimeout(_) => 504,
            GatewayError::Storage(_)
            | GatewayError::Metadata(_)
            | GatewayError::Watermark(_)
            | GatewayError::Internal(_) => 500,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            GatewayError::MissingParameter(_)
            | GatewayError::InvalidParameter { .. }
            | GatewayError::NotFound(_)
            | GatewayError::Unauthorized
            | GatewayError::MethodNotAllowed(_)
            | GatewayError::QuotaExceeded { .. } => ErrorClass::ClientParameter,
            GatewayError::Unavailable(_) => ErrorClass::ServerControl,
            GatewayError::Upstream { .. }
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::ProviderContract(_) => ErrorClass::Upstream,
            GatewayError::Storage(_) | GatewayError::Metadata(_) => ErrorClass::Storage,
            GatewayError::Watermark(_) | GatewayError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Message safe to show to clients.
    ///
    /// Internal and storage failures are logged in full but reported
    /// generically.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Internal(_) | GatewayError::Watermark(_) => {
                "internal server error".to_string()
            }
            GatewayError::Storage(_) => "failed to store or load the result".to_string(),
            GatewayError::Metadata(_) => "failed to record the result".to_string(),
            other => other.to_string(),
        }
    }

    pub fn allowed_values(&self) -> Option<&[String]> {
        match self {
            GatewayError::InvalidParameter {
                allowed: Some(values),
                ..
            } => Some(values),
            _ => None,
        }
    }
}
