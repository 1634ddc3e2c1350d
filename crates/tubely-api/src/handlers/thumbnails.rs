//! Thumbnail upload handler.
//!
//! Thumbnails are small, so they are held in memory and written to the
//! local assets directory as `{video_id}.{ext}`. A previous thumbnail under
//! the other extension is removed only once the record points at the new one.

use std::path::{Path as FsPath, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use tracing::{info, warn};
use tubely_ingest::retry::retry_async;
use tubely_ingest::IngestError;
use tubely_models::{media_type, VideoId, VideoRecord};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::parse_video_id;
use crate::handlers::videos::load_owned;
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the image.
pub const THUMBNAIL_FIELD: &str = "thumbnail";

const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "png"];

/// Upload a thumbnail image for a video.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<VideoRecord>> {
    let video_id = parse_video_id(&video_id)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(THUMBNAIL_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let extension = media_type::extension_for(&content_type)
            .filter(|_| media_type::is_thumbnail_type(&content_type))
            .ok_or_else(|| IngestError::UnsupportedMedia(content_type.clone()))?;

        let previous = load_owned(&state, &video_id, &user.user_id).await?;
        let data = read_capped(field, state.config.max_thumbnail_bytes).await?;

        let root = state.config.assets_root.as_path();
        let path = write_thumbnail(root, &video_id, extension, &data).await?;
        let url = format!("{}/{}.{}", state.config.assets_base_url, video_id, extension);

        let updated = match attach_thumbnail_url(&state, &video_id, &user, &url).await {
            Ok(updated) => updated,
            Err(e) => {
                // The record still names the previous file; keep that one served.
                if previous.thumbnail_url.as_deref() != Some(url.as_str()) {
                    remove_if_present(&path).await;
                }
                return Err(e);
            }
        };

        // A PNG replacing a JPEG (or vice versa) must not leave the old file served.
        for other in THUMBNAIL_EXTENSIONS.iter().filter(|e| **e != extension) {
            remove_if_present(&root.join(format!("{}.{}", video_id, other))).await;
        }

        metrics::record_thumbnail_stored(extension);
        info!(
            video_id = %video_id,
            path = %path.display(),
            bytes = data.len(),
            "Stored thumbnail"
        );
        return Ok(Json(updated));
    }

    Err(ApiError::bad_request(format!(
        "Missing multipart field \"{}\"",
        THUMBNAIL_FIELD
    )))
}

/// Point the record at `url`, re-reading it on every attempt so a
/// concurrent edit to another field only costs a retry.
async fn attach_thumbnail_url(
    state: &AppState,
    video_id: &VideoId,
    user: &AuthUser,
    url: &str,
) -> ApiResult<VideoRecord> {
    retry_async(
        &state.pipeline.config().record_retry,
        "update_thumbnail",
        is_retryable_update,
        || async {
            let mut record = load_owned(state, video_id, &user.user_id).await?;
            record.set_thumbnail_url(url.to_string());
            Ok::<_, ApiError>(state.records.update(&record).await?)
        },
    )
    .await
}

fn is_retryable_update(err: &ApiError) -> bool {
    matches!(err, ApiError::Firestore(e) if e.is_retryable() || e.is_precondition_failed())
}

async fn remove_if_present(path: &FsPath) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove thumbnail: {}", e),
    }
}

async fn read_capped(mut field: Field<'_>, limit: usize) -> ApiResult<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| IngestError::BodyRead(e.to_string()))?
    {
        if data.len() + chunk.len() > limit {
            return Err(IngestError::PayloadTooLarge {
                limit: limit as u64,
            }
            .into());
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Write via a temp name and rename, so readers never see a partial image.
async fn write_thumbnail(
    root: &FsPath,
    video_id: &VideoId,
    extension: &str,
    data: &[u8],
) -> ApiResult<PathBuf> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create assets directory: {}", e)))?;

    let path = root.join(format!("{}.{}", video_id, extension));
    let staging = root.join(format!(".{}.{}.tmp", video_id, extension));

    tokio::fs::write(&staging, data)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to write thumbnail: {}", e)))?;
    if let Err(e) = tokio::fs::rename(&staging, &path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(ApiError::internal(format!("Failed to store thumbnail: {}", e)));
    }

    Ok(path)
}
