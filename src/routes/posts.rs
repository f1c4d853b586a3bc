//! Post group endpoints (create/get/update/delete)

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tracing::warn;

use crate::AppState;
use crate::domain::connections::{self, Platform};
use crate::domain::posts::queries::{self as post_queries, NewPostGroup};
use crate::domain::posts::{GroupStatus, PlatformPost, PostGroup, PostStatus};
use crate::domain::media;
use crate::routes::auth::ApiAuth;
use crate::services::error::{ApiError, LogErr};
use crate::services::keys;
use crate::services::validate::{self, CreatePostRequest, UpdatePostRequest};
use crate::storage;

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit the write path; bursts beyond this are a client bug.
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(10)
        .burst_size(20)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/create-post", post(create_post))
        .route("/get-post/{post_group_id}", get(get_post))
        .route("/update-post/{post_group_id}", put(update_post))
        .route("/delete-post/{post_group_id}", delete(delete_post))
        .layer(rate_limit_layer)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostResponse {
    success: bool,
    post_group_id: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostResponse {
    platform: Platform,
    platform_connection_id: String,
    status: PostStatus,
    posted_id: Option<String>,
    published_url: Option<String>,
    error: Option<String>,
    publish_attempts: i32,
}

impl From<PlatformPost> for PostResponse {
    fn from(p: PlatformPost) -> Self {
        Self {
            platform: p.platform,
            platform_connection_id: p.platform_connection_id,
            status: p.status,
            posted_id: p.posted_id,
            published_url: p.published_url,
            error: p.error,
            publish_attempts: p.publish_attempts,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostGroupResponse {
    post_group_id: String,
    content: String,
    status: GroupStatus,
    scheduled_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    platforms: Vec<String>,
    posts: Vec<PostResponse>,
}

fn group_response(group: PostGroup, posts: Vec<PlatformPost>) -> PostGroupResponse {
    PostGroupResponse {
        post_group_id: group.post_group_id,
        content: group.content,
        status: group.status,
        scheduled_time: group.scheduled_time,
        created_at: group.created_at,
        updated_at: group.updated_at,
        platforms: posts
            .iter()
            .map(|p| p.platform_connection_id.clone())
            .collect(),
        posts: posts.into_iter().map(PostResponse::from).collect(),
    }
}

/// POST /create-post - Validate, fan out one post per platform, persist
async fn create_post(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<CreatePostResponse>, ApiError> {
    let validated = validate::validate_create(&req, Utc::now())?;

    enforce_monthly_limit(&state, &auth).await?;

    // Every reference must resolve to a connection the acting user owns.
    for (_, reference) in &validated.platforms {
        connections::get_connection(&state.db, auth.account.id, auth.acting_user(), reference)
            .await
            .log_500("Connection lookup error")?
            .ok_or_else(|| ApiError::ConnectionNotFound(reference.clone()))?;
    }

    let post_group_id = keys::generate_post_group_id();
    let new_group = NewPostGroup {
        post_group_id: &post_group_id,
        account_id: auth.account.id,
        workspace_user_id: auth.acting_user(),
        content: &validated.content,
        status: validated.status,
        scheduled_time: validated.scheduled_time,
        platforms: &validated.platforms,
    };

    post_queries::create_post_group(&state.db, &new_group)
        .await
        .log_500("Create post group error")?;

    tracing::info!(
        "created post group {} ({} platform(s), status {})",
        post_group_id,
        validated.platforms.len(),
        validated.status.as_str()
    );

    Ok(Json(CreatePostResponse {
        success: true,
        post_group_id,
    }))
}

/// GET /get-post/:postGroupId - Full group with nested per-platform posts
async fn get_post(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Path(post_group_id): Path<String>,
) -> Result<Json<PostGroupResponse>, ApiError> {
    let group = post_queries::get_post_group(
        &state.db,
        auth.account.id,
        auth.acting_user(),
        &post_group_id,
    )
    .await
    .log_500("Get post group error")?
    .ok_or(ApiError::PostNotFound)?;

    let posts = post_queries::list_posts(&state.db, &post_group_id)
        .await
        .log_500("List posts error")?;

    Ok(Json(group_response(group, posts)))
}

/// PUT /update-post/:postGroupId - Reschedule or (un)schedule a mutable group
async fn update_post(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Path(post_group_id): Path<String>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let validated = validate::validate_update(&req, Utc::now())?;

    let group = post_queries::get_post_group(
        &state.db,
        auth.account.id,
        auth.acting_user(),
        &post_group_id,
    )
    .await
    .log_500("Get post group error")?
    .ok_or(ApiError::PostNotFound)?;

    // Scheduling a draft that has no time on file queues it immediately.
    let mut scheduled_time = validated.scheduled_time;
    if validated.status == Some(GroupStatus::Scheduled)
        && scheduled_time.is_none()
        && group.scheduled_time.is_none()
    {
        scheduled_time = Some(Utc::now());
    }

    // The status predicate in the UPDATE is the authority on mutability; a
    // group the worker claimed between our read and this write matches zero
    // rows.
    let updated = post_queries::update_post_group(
        &state.db,
        auth.account.id,
        auth.acting_user(),
        &post_group_id,
        scheduled_time,
        validated.status,
    )
    .await
    .log_500("Update post group error")?;

    if !updated {
        let still_there = post_queries::get_post_group(
            &state.db,
            auth.account.id,
            auth.acting_user(),
            &post_group_id,
        )
        .await
        .log_500("Get post group error")?;

        return match still_there {
            None => Err(ApiError::PostNotFound),
            Some(_) => Err(ApiError::InvalidTransition),
        };
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /delete-post/:postGroupId - Remove a group that is not mid-publish
async fn delete_post(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Path(post_group_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let group = post_queries::get_post_group(
        &state.db,
        auth.account.id,
        auth.acting_user(),
        &post_group_id,
    )
    .await
    .log_500("Get post group error")?
    .ok_or(ApiError::PostNotFound)?;

    // Blob paths must be collected before the cascade removes the rows.
    // Published media is immutable and stays in storage.
    let cleanup_paths = if group.status.is_mutable() {
        media::list_media_paths(&state.db, &post_group_id)
            .await
            .log_500("List media paths error")?
    } else {
        Vec::new()
    };

    let deleted = post_queries::delete_post_group(
        &state.db,
        auth.account.id,
        auth.acting_user(),
        &post_group_id,
    )
    .await
    .log_500("Delete post group error")?;

    if !deleted {
        // The row was there a moment ago, so the worker claimed it.
        return Err(ApiError::InvalidTransition);
    }

    for path in cleanup_paths {
        if let Err(e) = storage::delete_data(
            state.gcs.as_ref(),
            state.local_storage_path.as_ref(),
            &state.bucket_name,
            &path,
        )
        .await
        {
            warn!("failed to delete media blob {}: {}", path, e);
        }
    }

    Ok(Json(SuccessResponse { success: true }))
}

async fn enforce_monthly_limit(state: &Arc<AppState>, auth: &ApiAuth) -> Result<(), ApiError> {
    let now = Utc::now();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .ok_or(ApiError::Internal)?;

    let used = post_queries::count_groups_created_since(&state.db, auth.account.id, month_start)
        .await
        .log_500("Monthly usage count error")?;

    if used >= auth.account.monthly_post_limit as i64 {
        return Err(ApiError::LimitReached);
    }

    Ok(())
}
