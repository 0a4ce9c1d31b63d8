//! Error types for the preview front-end

use std::time::Duration;

use thiserror::Error;

/// Main error type for the preview pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Render context unavailable: {0}")]
    RenderContextUnavailable(String),

    #[error("Render context was disposed")]
    DisposedContext,

    #[error("Rendering capability not available after {0:?}")]
    CapabilityTimeout(Duration),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Container {0} is no longer attached")]
    ContainerDetached(u64),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<shelfview_api::ApiError> for Error {
    fn from(err: shelfview_api::ApiError) -> Self {
        Error::Fetch(err.to_string())
    }
}
