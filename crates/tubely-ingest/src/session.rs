//! Per-upload state: the stage machine and the owned temp directory.
//!
//! Every intermediate file of an upload lives inside the session's
//! [`TempDir`], so dropping the session removes them regardless of whether
//! the upload finished, failed, panicked or was cancelled.

use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tubely_models::{OrientationClass, UserId, VideoId};
use tubely_storage::ObjectKey;

use crate::error::{IngestError, IngestResult};
use crate::logging::UploadLogger;

/// File name of the buffered upload inside the session directory.
pub const SOURCE_FILE_NAME: &str = "upload.mp4";

/// Prefix of every session directory under the work dir.
pub const SESSION_DIR_PREFIX: &str = "tubely-upload-";

/// Progress of one upload. Stages advance strictly in declaration order;
/// any stage may instead move to [`UploadStage::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStage {
    Authenticated,
    Validated,
    Buffered,
    Probed,
    Remuxed,
    Stored,
    RecordUpdated,
    Complete,
    Aborted,
}

impl UploadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Validated => "validated",
            Self::Buffered => "buffered",
            Self::Probed => "probed",
            Self::Remuxed => "remuxed",
            Self::Stored => "stored",
            Self::RecordUpdated => "record_updated",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        }
    }

    /// Next stage on the success path.
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Authenticated => Some(Self::Validated),
            Self::Validated => Some(Self::Buffered),
            Self::Buffered => Some(Self::Probed),
            Self::Probed => Some(Self::Remuxed),
            Self::Remuxed => Some(Self::Stored),
            Self::Stored => Some(Self::RecordUpdated),
            Self::RecordUpdated => Some(Self::Complete),
            Self::Complete | Self::Aborted => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller asserts about an incoming upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub video_id: VideoId,
    /// Already authenticated caller
    pub user_id: UserId,
    /// Declared content type of the file part
    pub content_type: String,
}

impl UploadRequest {
    pub fn new(video_id: VideoId, user_id: UserId, content_type: impl Into<String>) -> Self {
        Self {
            video_id,
            user_id,
            content_type: content_type.into(),
        }
    }
}

/// State of one in-flight upload.
#[derive(Debug)]
pub struct UploadSession {
    request: UploadRequest,
    stage: UploadStage,
    logger: UploadLogger,
    work_dir: Option<TempDir>,
    source_path: Option<PathBuf>,
    bytes_received: u64,
    orientation: Option<OrientationClass>,
    object_key: Option<ObjectKey>,
}

impl UploadSession {
    /// Start a session for an authenticated request. No files exist yet.
    pub fn new(request: UploadRequest) -> Self {
        let logger = UploadLogger::new(&request.video_id, &request.user_id);
        Self {
            request,
            stage: UploadStage::Authenticated,
            logger,
            work_dir: None,
            source_path: None,
            bytes_received: 0,
            orientation: None,
            object_key: None,
        }
    }

    pub fn request(&self) -> &UploadRequest {
        &self.request
    }

    pub fn stage(&self) -> UploadStage {
        self.stage
    }

    pub fn logger(&self) -> &UploadLogger {
        &self.logger
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn orientation(&self) -> Option<OrientationClass> {
        self.orientation
    }

    pub fn object_key(&self) -> Option<&ObjectKey> {
        self.object_key.as_ref()
    }

    /// The buffered upload, once buffering has finished.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Directory holding this session's files, once buffering has started.
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_ref().map(TempDir::path)
    }

    /// Move to the next success stage.
    pub(crate) fn advance(&mut self, next: UploadStage) {
        debug_assert_eq!(
            self.stage.successor(),
            Some(next),
            "illegal upload transition {} -> {}",
            self.stage,
            next
        );
        self.logger.log_transition(self.stage, next);
        self.stage = next;
    }

    /// Terminal failure. Returns the stage that was active when it happened.
    pub(crate) fn abort(&mut self) -> UploadStage {
        let failed_at = self.stage;
        if !failed_at.is_terminal() {
            self.logger.log_transition(failed_at, UploadStage::Aborted);
            self.stage = UploadStage::Aborted;
        }
        failed_at
    }

    pub(crate) fn set_orientation(&mut self, orientation: OrientationClass) {
        self.orientation = Some(orientation);
    }

    pub(crate) fn set_object_key(&mut self, key: ObjectKey) {
        self.object_key = Some(key);
    }

    /// Stream `body` into a fresh temp directory under `parent`, failing
    /// once more than `limit` bytes arrive. Returns the buffered file.
    pub(crate) async fn buffer<S, E>(
        &mut self,
        body: S,
        limit: u64,
        parent: &Path,
    ) -> IngestResult<PathBuf>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: fmt::Display + Send,
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(IngestError::Buffer)?;

        let dir = tempfile::Builder::new()
            .prefix(SESSION_DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(IngestError::Buffer)?;
        let path = dir.path().join(SOURCE_FILE_NAME);
        self.work_dir = Some(dir);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(IngestError::Buffer)?;

        let mut body = pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| IngestError::BodyRead(e.to_string()))?;
            self.bytes_received += chunk.len() as u64;
            if self.bytes_received > limit {
                return Err(IngestError::PayloadTooLarge { limit });
            }
            file.write_all(&chunk).await.map_err(IngestError::Buffer)?;
        }

        file.flush().await.map_err(IngestError::Buffer)?;
        file.sync_all().await.map_err(IngestError::Buffer)?;

        self.source_path = Some(path.clone());
        Ok(path)
    }

    /// Remove the temp directory now, logging rather than failing on error.
    pub fn close(mut self) {
        if let Some(dir) = self.work_dir.take() {
            if let Err(e) = dir.close() {
                self.logger.log_cleanup_failure(&e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn request() -> UploadRequest {
        UploadRequest::new(VideoId::new(), UserId::from("user-1"), "video/mp4")
    }

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_stage_order() {
        let mut stage = UploadStage::Authenticated;
        let mut seen = vec![stage];
        while let Some(next) = stage.successor() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(stage, UploadStage::Complete);
        assert!(UploadStage::Aborted.successor().is_none());
    }

    #[tokio::test]
    async fn test_buffer_writes_body() {
        let parent = tempfile::tempdir().unwrap();
        let mut session = UploadSession::new(request());

        let path = session
            .buffer(chunks(&[b"abc", b"def"]), 100, parent.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
        assert_eq!(session.bytes_received(), 6);
        assert!(path.starts_with(session.work_dir().unwrap()));
        assert_eq!(session.source_path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_buffer_enforces_limit() {
        let parent = tempfile::tempdir().unwrap();
        let mut session = UploadSession::new(request());

        let err = session
            .buffer(chunks(&[b"abc", b"def"]), 4, parent.path())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::PayloadTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_buffer_exactly_at_limit() {
        let parent = tempfile::tempdir().unwrap();
        let mut session = UploadSession::new(request());

        assert!(session
            .buffer(chunks(&[b"abcd"]), 4, parent.path())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let mut session = UploadSession::new(request());
        session
            .buffer(chunks(&[b"abc"]), 100, parent.path())
            .await
            .unwrap();

        let dir = session.work_dir().unwrap().to_path_buf();
        assert!(dir.exists());

        drop(session);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_abort_reports_active_stage() {
        let mut session = UploadSession::new(request());
        session.advance(UploadStage::Validated);

        assert_eq!(session.abort(), UploadStage::Validated);
        assert_eq!(session.stage(), UploadStage::Aborted);
    }
}
