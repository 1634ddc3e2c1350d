//! In-memory collaborators for exercising the pipeline without ffmpeg,
//! S3 or Firestore. Enabled by the `test-util` feature.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tubely_firestore::{FirestoreError, FirestoreResult, VideoRecordStore};
use tubely_media::{
    fast_start_output_path, FastStartRemuxer, MediaError, MediaProber, MediaResult,
    VideoDimensions,
};
use tubely_models::{UserId, VideoId, VideoRecord};
use tubely_storage::{ObjectKey, ObjectStore, StorageError, StorageResult};

#[derive(Debug, Clone)]
enum ProbeBehavior {
    Dimensions(VideoDimensions),
    Fail,
    Panic,
    Hang,
}

/// Scripted [`MediaProber`].
#[derive(Debug)]
pub struct FakeProber {
    behavior: ProbeBehavior,
    calls: AtomicUsize,
}

impl FakeProber {
    fn with(behavior: ProbeBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(width: u32, height: u32) -> Self {
        Self::with(ProbeBehavior::Dimensions(VideoDimensions::new(width, height)))
    }

    pub fn returning_dimensions(dimensions: VideoDimensions) -> Self {
        Self::with(ProbeBehavior::Dimensions(dimensions))
    }

    pub fn failing() -> Self {
        Self::with(ProbeBehavior::Fail)
    }

    pub fn panicking() -> Self {
        Self::with(ProbeBehavior::Panic)
    }

    /// Never completes; pair with a timeout to simulate cancellation.
    pub fn hanging() -> Self {
        Self::with(ProbeBehavior::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> MediaResult<VideoDimensions> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        match &self.behavior {
            ProbeBehavior::Dimensions(d) => Ok(*d),
            ProbeBehavior::Fail => Err(MediaError::invalid_video("no video stream")),
            ProbeBehavior::Panic => panic!("prober crashed"),
            ProbeBehavior::Hang => std::future::pending().await,
        }
    }
}

/// [`FastStartRemuxer`] that copies its input, or fails.
#[derive(Debug, Default)]
pub struct FakeRemuxer {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeRemuxer {
    pub fn copying() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FastStartRemuxer for FakeRemuxer {
    async fn remux(&self, input: &Path) -> MediaResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let output = fast_start_output_path(input);
        if self.fail {
            // Leave a partial output behind, as a crashed ffmpeg would.
            tokio::fs::write(&output, b"partial").await?;
            return Err(MediaError::ffmpeg_failed("remux failed", None, Some(1)));
        }
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }
}

/// An object captured by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: ObjectKey,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// [`ObjectStore`] keeping objects in memory, with injectable failures.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<Vec<StoredObject>>,
    failures: Mutex<VecDeque<StorageError>>,
    calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `put_object` call with `error`. Calls queue up.
    pub async fn fail_next(&self, error: StorageError) {
        self.failures.lock().await.push_back(error);
    }

    pub async fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().await.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        let bytes = tokio::fs::read(path).await?;
        self.objects.lock().await.push(StoredObject {
            bucket: bucket.to_string(),
            key: key.clone(),
            content_type: content_type.to_string(),
            bytes,
        });
        Ok(())
    }
}

/// [`VideoRecordStore`] with revision checks like the Firestore repository.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<VideoId, VideoRecord>>,
    update_failures: Mutex<VecDeque<FirestoreError>>,
    transfer: Mutex<Option<(usize, UserId)>>,
    pending_edit: Mutex<Option<String>>,
    revision: AtomicU64,
    gets: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> String {
        format!("rev-{}", self.revision.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Store `record` as-is, assigning a fresh revision.
    pub async fn insert(&self, mut record: VideoRecord) -> VideoRecord {
        record.version = Some(self.next_revision());
        self.records
            .lock()
            .await
            .insert(record.id.clone(), record.clone());
        record
    }

    /// Create and store a record owned by `owner`.
    pub async fn seed(&self, owner: &str) -> VideoRecord {
        self.insert(VideoRecord::new(UserId::from(owner), "Boots")).await
    }

    pub async fn record(&self, video_id: &VideoId) -> Option<VideoRecord> {
        self.records.lock().await.get(video_id).cloned()
    }

    /// Fail the next `update` call with `error`. Calls queue up.
    pub async fn fail_next_update(&self, error: FirestoreError) {
        self.update_failures.lock().await.push_back(error);
    }

    /// Hand every record to `new_owner` once `gets` reads have been served.
    pub async fn transfer_after_gets(&self, gets: usize, new_owner: &str) {
        *self.transfer.lock().await = Some((gets, UserId::from(new_owner)));
    }

    /// Have the owner set `thumbnail_url` just before the next `update` lands,
    /// so that update sees a newer revision than the one it read.
    pub async fn edit_thumbnail_before_next_update(&self, thumbnail_url: &str) {
        *self.pending_edit.lock().await = Some(thumbnail_url.to_string());
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoRecordStore for MemoryRecordStore {
    async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        let served = self.gets.fetch_add(1, Ordering::SeqCst);

        let mut records = self.records.lock().await;
        if let Some((after, owner)) = self.transfer.lock().await.as_ref() {
            if served >= *after {
                for record in records.values_mut() {
                    if &record.user_id != owner {
                        record.user_id = owner.clone();
                        record.version = Some(self.next_revision());
                    }
                }
            }
        }
        Ok(records.get(video_id).cloned())
    }

    async fn update(&self, record: &VideoRecord) -> FirestoreResult<VideoRecord> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.update_failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut records = self.records.lock().await;
        let stored = records
            .get_mut(&record.id)
            .ok_or_else(|| FirestoreError::not_found(format!("videos/{}", record.id)))?;

        if let Some(thumbnail_url) = self.pending_edit.lock().await.take() {
            stored.thumbnail_url = Some(thumbnail_url);
            stored.version = Some(self.next_revision());
        }

        if record.version.is_some() && record.version != stored.version {
            return Err(FirestoreError::PreconditionFailed(format!(
                "videos/{} changed since it was read",
                record.id
            )));
        }

        let mut updated = record.clone();
        updated.user_id = stored.user_id.clone();
        updated.created_at = stored.created_at;
        updated.version = Some(self.next_revision());
        *stored = updated.clone();
        Ok(updated)
    }
}
