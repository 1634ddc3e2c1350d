//! Video record repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use tubely_models::{UserId, VideoId, VideoRecord};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, ToFirestoreValue, Value};

/// Default collection holding video documents, keyed by video ID.
pub const VIDEOS_COLLECTION: &str = "videos";

/// Fields an update may change. Ownership and creation time are immutable.
const MUTABLE_FIELDS: &[&str] = &["title", "description", "thumbnail_url", "video_url", "updated_at"];

/// Keyed store of video records.
#[async_trait]
pub trait VideoRecordStore: Send + Sync {
    /// Fetch a record, `None` if it does not exist.
    async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>>;

    /// Persist the mutable fields of `record`.
    ///
    /// When `record.version` is set the write is conditional on the stored
    /// revision being unchanged. Returns the record with its new revision.
    async fn update(&self, record: &VideoRecord) -> FirestoreResult<VideoRecord>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> FirestoreResult<()> {
        Ok(())
    }
}

/// Firestore-backed [`VideoRecordStore`].
#[derive(Clone)]
pub struct VideoRepository {
    client: FirestoreClient,
    collection: String,
}

impl VideoRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self::with_collection(client, VIDEOS_COLLECTION)
    }

    pub fn with_collection(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Create from environment variables (`FIRESTORE_VIDEOS_COLLECTION` overrides the collection).
    pub fn from_env(client: FirestoreClient) -> Self {
        let collection = std::env::var("FIRESTORE_VIDEOS_COLLECTION")
            .ok()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| VIDEOS_COLLECTION.to_string());
        Self::with_collection(client, collection)
    }
}

#[async_trait]
impl VideoRecordStore for VideoRepository {
    async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        let doc = self
            .client
            .with_retry("get_video", || {
                self.client.get_document(&self.collection, video_id.as_str())
            })
            .await?;

        doc.map(|d| document_to_record(&d, video_id)).transpose()
    }

    async fn update(&self, record: &VideoRecord) -> FirestoreResult<VideoRecord> {
        let doc = self
            .client
            .update_document(
                &self.collection,
                record.id.as_str(),
                record_to_fields(record),
                MUTABLE_FIELDS,
                record.version.as_deref(),
            )
            .await?;

        debug!(video_id = %record.id, update_time = ?doc.update_time, "Updated video record");
        document_to_record(&doc, &record.id)
    }

    async fn ping(&self) -> FirestoreResult<()> {
        self.client.get_document("_health", "_check").await.map(|_| ())
    }
}

fn record_to_fields(record: &VideoRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("user_id".to_string(), record.user_id.as_str().to_firestore_value());
    fields.insert("title".to_string(), record.title.to_firestore_value());
    fields.insert("description".to_string(), record.description.to_firestore_value());
    fields.insert("thumbnail_url".to_string(), record.thumbnail_url.to_firestore_value());
    fields.insert("video_url".to_string(), record.video_url.to_firestore_value());
    fields.insert("created_at".to_string(), record.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), record.updated_at.to_firestore_value());
    fields
}

fn document_to_record(doc: &Document, video_id: &VideoId) -> FirestoreResult<VideoRecord> {
    let user_id: String = doc.get("user_id").ok_or_else(|| {
        FirestoreError::invalid_response(format!("video {} has no user_id", video_id))
    })?;

    let updated_at: Option<DateTime<Utc>> = doc.get("updated_at");
    let created_at: DateTime<Utc> = doc.get("created_at").unwrap_or_else(Utc::now);

    Ok(VideoRecord {
        id: video_id.clone(),
        user_id: UserId::new(user_id),
        title: doc.get("title").unwrap_or_default(),
        description: doc.get("description").unwrap_or_default(),
        thumbnail_url: doc.get("thumbnail_url"),
        video_url: doc.get("video_url"),
        created_at,
        updated_at: updated_at.unwrap_or(created_at),
        version: doc.update_time.clone(),
    })
}
