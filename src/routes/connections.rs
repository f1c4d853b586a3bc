//! Platform connection endpoints (read-only)

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::domain::connections::{self, PlatformConnection};
use crate::routes::auth::ApiAuth;
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/platform-connections", get(list_connections))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionResponse {
    platform_id: String,
    username: String,
    display_name: String,
    profile_image_url: Option<String>,
    access_token_expires_at: Option<DateTime<Utc>>,
}

impl From<PlatformConnection> for ConnectionResponse {
    fn from(c: PlatformConnection) -> Self {
        Self {
            platform_id: c.platform_id,
            username: c.username,
            display_name: c.display_name,
            profile_image_url: c.profile_image_url,
            access_token_expires_at: c.access_token_expires_at,
        }
    }
}

#[derive(Serialize)]
struct ConnectionsResponse {
    connections: Vec<ConnectionResponse>,
}

/// GET /platform-connections - Connections visible to the acting user
async fn list_connections(
    State(state): State<Arc<AppState>>,
    auth: ApiAuth,
) -> Result<Json<ConnectionsResponse>, ApiError> {
    let connections =
        connections::list_connections(&state.db, auth.account.id, auth.acting_user())
            .await
            .log_500("List connections error")?;

    Ok(Json(ConnectionsResponse {
        connections: connections
            .into_iter()
            .map(ConnectionResponse::from)
            .collect(),
    }))
}
