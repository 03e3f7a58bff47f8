// Kagami AI media generation gateway library

pub mod accounting;
pub mod artifact;
pub mod config;
pub mod constants;
pub mod endpoints;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod params;
pub mod proxy;
pub mod quota;
pub mod responder;
pub mod router;
pub mod state;
pub mod storage;
pub mod upstream;
pub mod watermark;
