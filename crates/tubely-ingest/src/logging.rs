//! Structured upload logging.
//!
//! Keeps the video and user IDs attached to every line logged for one upload.

use tracing::{debug, error, info, warn, Span};
use tubely_models::{UserId, VideoId};

use crate::error::IngestError;
use crate::session::UploadStage;

#[derive(Debug, Clone)]
pub struct UploadLogger {
    video_id: String,
    user_id: String,
}

impl UploadLogger {
    pub fn new(video_id: &VideoId, user_id: &UserId) -> Self {
        Self {
            video_id: video_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn log_start(&self, content_type: &str) {
        info!(
            video_id = %self.video_id,
            user_id = %self.user_id,
            content_type = %content_type,
            "Upload started"
        );
    }

    pub fn log_transition(&self, from: UploadStage, to: UploadStage) {
        debug!(
            video_id = %self.video_id,
            from = from.as_str(),
            to = to.as_str(),
            "Upload stage transition"
        );
    }

    pub fn log_completion(&self, key: &str, bytes: u64, elapsed_ms: u64) {
        info!(
            video_id = %self.video_id,
            user_id = %self.user_id,
            key = %key,
            bytes,
            elapsed_ms,
            "Upload completed"
        );
    }

    /// Client mistakes are logged at warn, service failures at error.
    pub fn log_abort(&self, stage: UploadStage, err: &IngestError) {
        if err.is_client_error() {
            warn!(
                video_id = %self.video_id,
                user_id = %self.user_id,
                stage = stage.as_str(),
                error = err.kind(),
                "Upload rejected: {}", err
            );
        } else {
            error!(
                video_id = %self.video_id,
                user_id = %self.user_id,
                stage = stage.as_str(),
                error = err.kind(),
                "Upload failed: {}", err
            );
        }
    }

    pub fn log_orphan(&self, bucket: &str, key: &str) {
        error!(
            video_id = %self.video_id,
            bucket = %bucket,
            key = %key,
            "Stored object is not referenced by any record"
        );
    }

    pub fn log_cleanup_failure(&self, err: &std::io::Error) {
        warn!(
            video_id = %self.video_id,
            "Failed to remove upload temp directory: {}", err
        );
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "upload",
            video_id = %self.video_id,
            user_id = %self.user_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_creation() {
        let video_id = VideoId::new();
        let logger = UploadLogger::new(&video_id, &UserId::from("user-1"));

        assert_eq!(logger.video_id, video_id.to_string());
        assert_eq!(logger.user_id, "user-1");
    }
}
