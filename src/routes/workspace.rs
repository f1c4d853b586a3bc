//! Workspace user CRUD endpoints
//!
//! Managed users exist so one API key can act on behalf of many people via
//! the `x-publora-user-id` header.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::domain::workspace::{self, WorkspaceUser};
use crate::routes::auth::ApiAuth;
use crate::services::error::{ApiError, LogErr};
use crate::services::keys;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workspace/users", get(list_users).post(create_user))
        .route("/workspace/users/{user_id}", delete(delete_user))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    user_id: String,
    name: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<WorkspaceUser> for UserResponse {
    fn from(u: WorkspaceUser) -> Self {
        Self {
            user_id: u.id,
            name: u.name,
            email: u.email,
            created_at: u.created_at,
        }
    }
}

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<UserResponse>,
}

/// GET /workspace/users - List the account's managed users
async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = workspace::list_workspace_users(&state.db, auth.account.id)
        .await
        .log_500("List workspace users error")?;

    Ok(Json(UsersResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    name: String,
    email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserResponse {
    success: bool,
    user_id: String,
}

/// POST /workspace/users - Create a managed user
async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    let user_id = keys::generate_workspace_user_id();

    workspace::insert_workspace_user(
        &state.db,
        &user_id,
        auth.account.id,
        &req.name,
        req.email.as_deref(),
    )
    .await
    .log_500("Create workspace user error")?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            success: true,
            user_id,
        }),
    ))
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// DELETE /workspace/users/:userId - Remove a managed user
async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
    Path(user_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let deleted = workspace::delete_workspace_user(&state.db, auth.account.id, &user_id)
        .await
        .log_500("Delete workspace user error")?;

    if !deleted {
        return Err(ApiError::UserNotFound);
    }

    Ok(Json(SuccessResponse { success: true }))
}
