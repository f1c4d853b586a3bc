//! Media upload broker endpoints
//!
//! Ordering contract: `/get-upload-url` requires the post group to already
//! exist, so the flow is always create-post, then get-upload-url, then a
//! direct PUT of the bytes to the signed target. The target is time-limited
//! and single-use; completing it attaches the asset to the group.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    routing::{post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::constants::UPLOAD_URL_EXPIRY_SECS;
use crate::domain::media;
use crate::domain::posts::queries as post_queries;
use crate::platforms::limits;
use crate::routes::auth::ApiAuth;
use crate::services::error::{ApiError, LogErr};
use crate::services::{keys, signing};
use crate::storage;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/get-upload-url", post(get_upload_url))
        .route("/media/upload/{media_id}", put(upload_media))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlRequest {
    file_name: String,
    content_type: String,
    post_group_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    file_url: String,
    media_id: String,
}

/// POST /get-upload-url - Issue a signed, single-use upload target
async fn get_upload_url(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Json(req): Json<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>, ApiError> {
    let is_image = req.content_type.starts_with("image/");
    let is_video = req.content_type.starts_with("video/");
    if !is_image && !is_video {
        return Err(ApiError::UnsupportedMediaType);
    }

    // Uploads cannot be requested before the post exists.
    let group = post_queries::get_post_group(
        &state.db,
        auth.account.id,
        auth.acting_user(),
        &req.post_group_id,
    )
    .await
    .log_500("Get post group error")?
    .ok_or(ApiError::PostNotFound)?;

    if !group.status.is_mutable() {
        return Err(ApiError::InvalidTransition);
    }

    // Gate against the most restrictive platform in the group right now,
    // instead of failing the whole publish later.
    let platforms: Vec<_> = post_queries::list_posts(&state.db, &req.post_group_id)
        .await
        .log_500("List posts error")?
        .into_iter()
        .map(|p| p.platform)
        .collect();
    let capacity = limits::media_capacity(&platforms);

    let (images, videos) = media::count_assets_by_kind(&state.db, &req.post_group_id)
        .await
        .log_500("Count media error")?;

    if (is_image && images + 1 > capacity.max_images)
        || (is_video && videos + 1 > capacity.max_videos)
    {
        return Err(ApiError::MediaLimitExceeded);
    }

    let media_id = keys::generate_media_id();
    let storage_path =
        storage::media_storage_path(auth.account.id, &req.post_group_id, &media_id, &req.file_name);
    let file_url = format!("{}/{}", state.media_base_url, storage_path);

    let expires = Utc::now().timestamp() + UPLOAD_URL_EXPIRY_SECS;
    let signature = signing::sign_upload(&state.media_signing_secret, &media_id, expires);
    let upload_url = format!(
        "{}/media/upload/{}?expires={}&signature={}",
        state.api_base_url, media_id, expires, signature
    );

    media::insert_media_asset(
        &state.db,
        &media_id,
        &req.post_group_id,
        &req.file_name,
        &req.content_type,
        &storage_path,
        &file_url,
    )
    .await
    .log_500("Insert media asset error")?;

    Ok(Json(UploadUrlResponse {
        upload_url,
        file_url,
        media_id,
    }))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    expires: i64,
    signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    file_url: String,
}

/// PUT /media/upload/:mediaId - The signed upload target itself. Auth is the
/// signature, not an API key, so storage tools can PUT directly.
async fn upload_media(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    signing::verify_upload(
        &state.media_signing_secret,
        &media_id,
        query.expires,
        &query.signature,
        Utc::now().timestamp(),
    )?;

    let asset = media::get_media_asset(&state.db, &media_id)
        .await
        .log_500("Get media asset error")?
        .ok_or(ApiError::MediaNotFound)?;

    // Refuse consumed targets before touching storage; the CAS below is
    // still the authority under concurrent PUTs.
    if asset.status != media::MediaStatus::Pending {
        return Err(ApiError::UploadExpired);
    }

    storage::upload_data(
        state.gcs.as_ref(),
        state.local_storage_path.as_ref(),
        &state.bucket_name,
        &asset.storage_path,
        &body,
    )
    .await
    .log_500("Media upload error")?;

    // The target is single-use: a second PUT finds the asset consumed.
    let attached = media::mark_media_uploaded(&state.db, &media_id)
        .await
        .log_500("Mark media uploaded error")?;
    if !attached {
        return Err(ApiError::UploadExpired);
    }

    tracing::info!(
        "media {} attached to group {} ({} bytes)",
        media_id,
        asset.post_group_id,
        body.len()
    );

    Ok(Json(UploadResponse {
        success: true,
        file_url: asset.file_url,
    }))
}
