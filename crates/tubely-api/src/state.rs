//! Application state.

use std::sync::Arc;

use tubely_firestore::{FirestoreClient, VideoRecordStore, VideoRepository};
use tubely_ingest::{IngestConfig, UploadPipeline};
use tubely_storage::{ObjectStore, S3Client};

use crate::auth::TokenVerifier;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<UploadPipeline>,
    pub records: Arc<dyn VideoRecordStore>,
    pub store: Arc<dyn ObjectStore>,
    pub tokens: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire state around an already-built pipeline, sharing its stores.
    pub fn new(config: ApiConfig, pipeline: UploadPipeline) -> Self {
        let records = Arc::clone(pipeline.records());
        let store = Arc::clone(pipeline.store());
        let tokens = Arc::new(TokenVerifier::new(&config.jwt_secret));

        Self {
            config,
            pipeline: Arc::new(pipeline),
            records,
            store,
            tokens,
        }
    }

    /// Create state backed by S3, Firestore and the ffmpeg tools.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let ingest = IngestConfig::from_env()?;
        let storage = S3Client::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        let records = VideoRepository::from_env(firestore);

        let pipeline = UploadPipeline::with_ffmpeg(ingest, Arc::new(storage), Arc::new(records));

        Ok(Self::new(config, pipeline))
    }

    pub fn bucket(&self) -> &str {
        &self.pipeline.config().bucket
    }
}
