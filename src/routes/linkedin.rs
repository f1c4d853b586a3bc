//! LinkedIn analytics and reaction endpoints
//!
//! Thin proxies over [`crate::services::linkedin::LinkedInClient`]. These
//! read published-post identifiers but never touch post group state.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::AppState;
use crate::domain::connections::{self, Platform, PlatformConnection};
use crate::routes::auth::ApiAuth;
use crate::services::error::{ApiError, LogErr};
use crate::services::linkedin::{QueryTypes, parse_query_types};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/linkedin-post-statistics", post(post_statistics))
        .route("/linkedin-account-statistics", post(account_statistics))
        .route(
            "/linkedin-reactions",
            post(create_reaction).delete(delete_reaction),
        )
}

/// Resolve a LinkedIn connection owned by the acting user
async fn linkedin_connection(
    state: &Arc<AppState>,
    auth: &ApiAuth,
    platform_id: &str,
) -> Result<PlatformConnection, ApiError> {
    let connection =
        connections::get_connection(&state.db, auth.account.id, auth.acting_user(), platform_id)
            .await
            .log_500("Connection lookup error")?
            .ok_or_else(|| ApiError::ConnectionNotFound(platform_id.to_string()))?;

    if connection.platform != Platform::Linkedin {
        return Err(ApiError::ConnectionNotFound(platform_id.to_string()));
    }

    Ok(connection)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostStatisticsRequest {
    platform_id: String,
    posted_id: String,
    query_types: QueryTypes,
}

#[derive(Serialize)]
struct StatisticsResponse {
    metrics: HashMap<String, i64>,
}

/// POST /linkedin-post-statistics - Engagement metrics for one post
async fn post_statistics(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Json(req): Json<PostStatisticsRequest>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let metrics = parse_query_types(&req.query_types)?;
    let connection = linkedin_connection(&state, &auth, &req.platform_id).await?;

    let values = state
        .linkedin
        .post_statistics(
            &connection.access_token,
            connection.native_id(),
            &req.posted_id,
            &metrics,
        )
        .await
        .log_500("LinkedIn post statistics error")?;

    Ok(Json(StatisticsResponse { metrics: values }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountStatisticsRequest {
    platform_id: String,
    query_types: QueryTypes,
}

/// POST /linkedin-account-statistics - Metrics aggregated across the account
async fn account_statistics(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Json(req): Json<AccountStatisticsRequest>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let metrics = parse_query_types(&req.query_types)?;
    let connection = linkedin_connection(&state, &auth, &req.platform_id).await?;

    let values = state
        .linkedin
        .account_statistics(&connection.access_token, connection.native_id(), &metrics)
        .await
        .log_500("LinkedIn account statistics error")?;

    Ok(Json(StatisticsResponse { metrics: values }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionRequest {
    platform_id: String,
    posted_id: String,
    reaction_type: Option<String>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// POST /linkedin-reactions - React to a post as the connected member
async fn create_reaction(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let connection = linkedin_connection(&state, &auth, &req.platform_id).await?;
    let reaction_type = req.reaction_type.as_deref().unwrap_or("LIKE");

    state
        .linkedin
        .create_reaction(
            &connection.access_token,
            connection.native_id(),
            &req.posted_id,
            reaction_type,
        )
        .await
        .log_500("LinkedIn create reaction error")?;

    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /linkedin-reactions - Remove the member's reaction
async fn delete_reaction(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let connection = linkedin_connection(&state, &auth, &req.platform_id).await?;

    state
        .linkedin
        .delete_reaction(
            &connection.access_token,
            connection.native_id(),
            &req.posted_id,
        )
        .await
        .log_500("LinkedIn delete reaction error")?;

    Ok(Json(SuccessResponse { success: true }))
}
