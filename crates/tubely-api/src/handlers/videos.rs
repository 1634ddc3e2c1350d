//! Video upload and lookup handlers.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use tracing::info;
use tubely_ingest::{IngestError, UploadRequest};
use tubely_models::{UserId, VideoId, VideoRecord};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::parse_video_id;
use crate::state::AppState;

/// Multipart field carrying the video file.
pub const VIDEO_FIELD: &str = "video";

/// Upload the video file for an existing record.
///
/// The file part is streamed straight into the pipeline; nothing is
/// buffered here.
pub async fn upload_video(
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
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        info!(
            video_id = %video_id,
            user_id = %user.user_id,
            "Received video upload"
        );

        let request = UploadRequest::new(video_id, user.user_id, content_type);
        let record = state.pipeline.ingest(request, field).await?;
        return Ok(Json(record));
    }

    Err(ApiError::bad_request(format!(
        "Missing multipart field \"{}\"",
        VIDEO_FIELD
    )))
}

/// Get one of the caller's video records.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<VideoRecord>> {
    let video_id = parse_video_id(&video_id)?;
    let record = load_owned(&state, &video_id, &user.user_id).await?;
    Ok(Json(record))
}

/// Fetch a record and check `user_id` owns it.
pub(crate) async fn load_owned(
    state: &AppState,
    video_id: &VideoId,
    user_id: &UserId,
) -> ApiResult<VideoRecord> {
    let record = state
        .records
        .get(video_id)
        .await
        .map_err(|e| ApiError::Ingest(IngestError::RecordLookup(e)))?
        .ok_or_else(|| IngestError::NotFound(video_id.clone()))?;

    if !record.is_owned_by(user_id) {
        return Err(IngestError::NotOwner {
            video_id: video_id.clone(),
            user_id: user_id.clone(),
            orphaned_key: None,
        }
        .into());
    }
    Ok(record)
}
