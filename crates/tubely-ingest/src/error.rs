//! Upload pipeline error types.

use thiserror::Error;
use tubely_firestore::FirestoreError;
use tubely_media::MediaError;
use tubely_models::{UserId, VideoId};
use tubely_storage::{ObjectKey, StorageError};

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Video not found: {0}")]
    NotFound(VideoId),

    #[error("User {user_id} does not own video {video_id}")]
    NotOwner {
        video_id: VideoId,
        user_id: UserId,
        /// Set when ownership changed after the object was already stored
        orphaned_key: Option<ObjectKey>,
    },

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("Failed to read upload body: {0}")]
    BodyRead(String),

    #[error("Failed to buffer upload: {0}")]
    Buffer(#[source] std::io::Error),

    #[error("Failed to look up video record: {0}")]
    RecordLookup(#[source] FirestoreError),

    #[error("Failed to probe video: {0}")]
    Probe(#[source] MediaError),

    #[error("Failed to remux video: {0}")]
    Remux(#[source] MediaError),

    #[error("Failed to store object: {0}")]
    StorageWrite(#[source] StorageError),

    #[error("Failed to update video record, object {orphaned_key} is orphaned: {source}")]
    RecordUpdate {
        #[source]
        source: FirestoreError,
        orphaned_key: ObjectKey,
    },
}

impl IngestError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-readable name, used as the error code and metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::UnsupportedMedia(_) => "unsupported_media",
            Self::NotFound(_) => "not_found",
            Self::NotOwner { .. } => "not_owner",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::BodyRead(_) => "body_read",
            Self::Buffer(_) => "buffer",
            Self::RecordLookup(_) => "record_lookup",
            Self::Probe(_) => "probe",
            Self::Remux(_) => "remux",
            Self::StorageWrite(_) => "storage_write",
            Self::RecordUpdate { .. } => "record_update",
        }
    }

    /// Whether the request itself was at fault (as opposed to the service).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMedia(_)
                | Self::NotFound(_)
                | Self::NotOwner { .. }
                | Self::PayloadTooLarge { .. }
                | Self::BodyRead(_)
        )
    }

    /// Stored object left without a referencing record, if any.
    pub fn orphaned_key(&self) -> Option<&ObjectKey> {
        match self {
            Self::RecordUpdate { orphaned_key, .. } => Some(orphaned_key),
            Self::NotOwner { orphaned_key, .. } => orphaned_key.as_ref(),
            _ => None,
        }
    }

    /// Whether repeating the failed step may succeed.
    ///
    /// A failed record precondition is retryable because every attempt
    /// re-reads the record first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StorageWrite(e) => e.is_retryable(),
            Self::RecordUpdate { source, .. } => {
                source.is_retryable() || source.is_precondition_failed()
            }
            _ => false,
        }
    }

    /// Attach an already-stored object to a failure in the final record step.
    pub(crate) fn orphaning(self, key: &ObjectKey) -> Self {
        match self {
            Self::NotOwner {
                video_id, user_id, ..
            } => Self::NotOwner {
                video_id,
                user_id,
                orphaned_key: Some(key.clone()),
            },
            Self::NotFound(video_id) => Self::RecordUpdate {
                source: FirestoreError::not_found(format!("videos/{}", video_id)),
                orphaned_key: key.clone(),
            },
            Self::RecordLookup(source) => Self::RecordUpdate {
                source,
                orphaned_key: key.clone(),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubely_models::OrientationClass;

    #[test]
    fn test_client_errors() {
        assert!(IngestError::UnsupportedMedia("image/gif".into()).is_client_error());
        assert!(IngestError::PayloadTooLarge { limit: 1 }.is_client_error());
        assert!(!IngestError::Probe(MediaError::invalid_video("x")).is_client_error());
    }

    #[test]
    fn test_orphaning_late_ownership_change() {
        let key = ObjectKey::generate(OrientationClass::Landscape);
        let err = IngestError::NotOwner {
            video_id: VideoId::new(),
            user_id: UserId::from("u"),
            orphaned_key: None,
        }
        .orphaning(&key);

        assert_eq!(err.orphaned_key(), Some(&key));
        assert_eq!(err.kind(), "not_owner");
    }

    #[test]
    fn test_orphaning_missing_record() {
        let key = ObjectKey::generate(OrientationClass::Other);
        let err = IngestError::NotFound(VideoId::new()).orphaning(&key);
        assert_eq!(err.kind(), "record_update");
        assert_eq!(err.orphaned_key(), Some(&key));
    }

    #[test]
    fn test_retryable() {
        let key = ObjectKey::generate(OrientationClass::Other);
        let stale = IngestError::RecordUpdate {
            source: FirestoreError::PreconditionFailed("stale".into()),
            orphaned_key: key.clone(),
        };
        assert!(stale.is_retryable());

        let denied = IngestError::RecordUpdate {
            source: FirestoreError::PermissionDenied("no".into()),
            orphaned_key: key,
        };
        assert!(!denied.is_retryable());

        assert!(IngestError::StorageWrite(StorageError::upload_transient("reset")).is_retryable());
        assert!(!IngestError::StorageWrite(StorageError::upload_failed("denied")).is_retryable());
    }
}
