//! Request handlers.

pub mod health;
pub mod thumbnails;
pub mod videos;

pub use health::*;
pub use thumbnails::*;
pub use videos::*;

use tubely_models::VideoId;

use crate::error::ApiError;

/// Parse the `{video_id}` path segment.
pub(crate) fn parse_video_id(raw: &str) -> Result<VideoId, ApiError> {
    VideoId::parse(raw).map_err(|e| ApiError::InvalidId(e.to_string()))
}
