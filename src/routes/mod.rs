pub mod auth;
pub mod connections;
pub mod linkedin;
pub mod media;
pub mod posts;
pub mod workspace;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(posts::routes())
        .merge(connections::routes())
        .merge(media::routes())
        .merge(linkedin::routes())
        .merge(workspace::routes())
}
