//! The upload pipeline.
//!
//! Stages run in a fixed order: validate, buffer to a temp file, probe,
//! remux for fast start, store under a fresh random key, then point the
//! record at the new object. A failure anywhere aborts the remaining
//! stages and the session's temp directory is removed on the way out.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::Stream;
use tracing::Instrument;
use tubely_firestore::VideoRecordStore;
use tubely_media::{FastStartRemuxer, FfmpegRemuxer, FfprobeProber, MediaProber};
use tubely_models::{media_type, UserId, VideoId, VideoRecord};
use tubely_storage::{ObjectKey, ObjectStore};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::metrics;
use crate::retry::retry_async;
use crate::session::{UploadRequest, UploadSession, UploadStage};

/// Runs uploads end to end against injected collaborators.
pub struct UploadPipeline {
    config: IngestConfig,
    prober: Arc<dyn MediaProber>,
    remuxer: Arc<dyn FastStartRemuxer>,
    store: Arc<dyn ObjectStore>,
    records: Arc<dyn VideoRecordStore>,
}

impl UploadPipeline {
    pub fn new(
        config: IngestConfig,
        prober: Arc<dyn MediaProber>,
        remuxer: Arc<dyn FastStartRemuxer>,
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn VideoRecordStore>,
    ) -> Self {
        Self {
            config,
            prober,
            remuxer,
            store,
            records,
        }
    }

    /// Pipeline using the ffprobe/ffmpeg executables with the configured deadlines.
    pub fn with_ffmpeg(
        config: IngestConfig,
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn VideoRecordStore>,
    ) -> Self {
        let prober = FfprobeProber::new().with_timeout(config.probe_timeout);
        let remuxer = FfmpegRemuxer::new().with_timeout(config.remux_timeout);
        Self::new(config, Arc::new(prober), Arc::new(remuxer), store, records)
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn records(&self) -> &Arc<dyn VideoRecordStore> {
        &self.records
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Process one upload and return the updated record.
    ///
    /// `body` is consumed only after the content type and ownership checks
    /// pass. Temp files are gone by the time this returns, and also when the
    /// returned future is dropped before completion.
    pub async fn ingest<S, E>(&self, request: UploadRequest, body: S) -> IngestResult<VideoRecord>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: std::fmt::Display + Send,
    {
        let mut session = UploadSession::new(request);
        let span = session.logger().create_span();

        async move {
            let _in_flight = metrics::track_in_flight();
            let started = Instant::now();
            session
                .logger()
                .log_start(&session.request().content_type);

            let result = self.run(&mut session, body).await;

            match &result {
                Ok(_) => {
                    session.advance(UploadStage::Complete);
                    let key = session.object_key().map(ObjectKey::as_str).unwrap_or_default();
                    session.logger().log_completion(
                        key,
                        session.bytes_received(),
                        started.elapsed().as_millis() as u64,
                    );
                    metrics::record_upload_success(
                        session.orientation().map(|o| o.as_str()).unwrap_or("unknown"),
                        session.bytes_received(),
                        started.elapsed(),
                    );
                }
                Err(e) => {
                    let failed_at = session.abort();
                    session.logger().log_abort(failed_at, e);
                    if let Some(key) = e.orphaned_key() {
                        session.logger().log_orphan(&self.config.bucket, key.as_str());
                        metrics::record_orphaned_object(key.namespace());
                    }
                    metrics::record_upload_failure(e.kind(), failed_at.as_str(), started.elapsed());
                }
            }

            session.close();
            result
        }
        .instrument(span)
        .await
    }

    async fn run<S, E>(&self, session: &mut UploadSession, body: S) -> IngestResult<VideoRecord>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: std::fmt::Display + Send,
    {
        let request = session.request().clone();

        if !media_type::is_video_mp4(&request.content_type) {
            return Err(IngestError::UnsupportedMedia(request.content_type));
        }
        self.load_owned_record(&request.video_id, &request.user_id).await?;
        session.advance(UploadStage::Validated);

        let source = session
            .buffer(body, self.config.max_upload_bytes, &self.config.work_dir)
            .await?;
        session.advance(UploadStage::Buffered);

        let dimensions = self.prober.probe(&source).await.map_err(IngestError::Probe)?;
        let orientation = dimensions.orientation();
        session.set_orientation(orientation);
        session.advance(UploadStage::Probed);

        let processed = self.remuxer.remux(&source).await.map_err(IngestError::Remux)?;
        session.advance(UploadStage::Remuxed);

        let key = ObjectKey::generate(orientation);
        self.store_object(&key, &processed).await?;
        session.set_object_key(key.clone());
        session.advance(UploadStage::Stored);

        let updated = self.attach_video_url(&request, &key).await?;
        session.advance(UploadStage::RecordUpdated);

        Ok(updated)
    }

    async fn load_record(&self, video_id: &VideoId) -> IngestResult<VideoRecord> {
        self.records
            .get(video_id)
            .await
            .map_err(IngestError::RecordLookup)?
            .ok_or_else(|| IngestError::NotFound(video_id.clone()))
    }

    /// Fetch the record and check the caller owns it.
    async fn load_owned_record(
        &self,
        video_id: &VideoId,
        user_id: &UserId,
    ) -> IngestResult<VideoRecord> {
        let record = self.load_record(video_id).await?;

        if !record.is_owned_by(user_id) {
            return Err(IngestError::NotOwner {
                video_id: video_id.clone(),
                user_id: user_id.clone(),
                orphaned_key: None,
            });
        }
        Ok(record)
    }

    async fn store_object(&self, key: &ObjectKey, path: &Path) -> IngestResult<()> {
        retry_async(
            &self.config.store_retry,
            "store_object",
            IngestError::is_retryable,
            || async {
                self.store
                    .put_object(&self.config.bucket, key, path, media_type::VIDEO_MP4)
                    .await
                    .map_err(IngestError::StorageWrite)
            },
        )
        .await
    }

    /// Point the record at the stored object.
    ///
    /// Each attempt re-reads the record, so the write is conditional on a
    /// fresh revision and a concurrent edit only costs a retry. Ownership is
    /// checked again on that read unless disabled in the config.
    async fn attach_video_url(
        &self,
        request: &UploadRequest,
        key: &ObjectKey,
    ) -> IngestResult<VideoRecord> {
        let url = self.config.public_urls.object_url(key);

        retry_async(
            &self.config.record_retry,
            "update_record",
            IngestError::is_retryable,
            || async {
                let fresh = if self.config.recheck_owner_before_update {
                    self.load_owned_record(&request.video_id, &request.user_id).await
                } else {
                    self.load_record(&request.video_id).await
                };
                let mut record = fresh.map_err(|e| e.orphaning(key))?;
                record.set_video_url(url.clone());

                self.records
                    .update(&record)
                    .await
                    .map_err(|source| IngestError::RecordUpdate {
                        source,
                        orphaned_key: key.clone(),
                    })
            },
        )
        .await
    }
}
