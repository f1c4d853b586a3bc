//! Standalone media file server.
//!
//! Serves uploaded media over HTTP so platform APIs that pull media by URL
//! (Instagram, Threads, TikTok, Telegram, Facebook) can fetch attachments,
//! and so `fileUrl` values returned by `/get-upload-url` resolve publicly.
//!
//! Supports two storage backends:
//! - **Local disk**: reads from `LOCAL_STORAGE_PATH`
//! - **GCS**: fetches from Google Cloud Storage (requires
//!   `GOOGLE_APPLICATION_CREDENTIALS`)
//!
//! Tries local first, falls back to GCS.
//!
//! ## Environment Variables
//! - `LOCAL_STORAGE_PATH` - directory containing media files (optional)
//! - `GCS_BUCKET_NAME` - GCS bucket name (default: `publora_media`)
//! - `MEDIA_SERVER_PORT` - port to listen on (default: `3001`)

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use google_cloud_storage::client::Storage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

struct MediaState {
    local_storage_path: Option<PathBuf>,
    gcs: Option<Storage>,
    gcs_bucket: String,
}

fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".mp4") {
        "video/mp4"
    } else if path.ends_with(".webm") {
        "video/webm"
    } else if path.ends_with(".mov") {
        "video/quicktime"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

async fn serve_file(
    State(state): State<Arc<MediaState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    // Path traversal protection
    if path.contains("..") || path.contains('\0') || path.starts_with('/') {
        return Err(StatusCode::FORBIDDEN);
    }

    let content_type = content_type_for(&path);

    // Media paths embed a random asset id and bytes never change after
    // upload, so aggressive caching is safe.
    let cache_control = "public, max-age=86400, immutable";

    // Try local storage first
    if let Some(ref local_path) = state.local_storage_path {
        let full_path = local_path.join(&path);
        if let Ok(canonical) = full_path.canonicalize() {
            if let Ok(storage_canonical) = local_path.canonicalize() {
                if canonical.starts_with(&storage_canonical) {
                    if let Ok(bytes) = tokio::fs::read(&canonical).await {
                        return Ok((
                            [
                                (header::CONTENT_TYPE, content_type),
                                (header::CACHE_CONTROL, cache_control),
                            ],
                            bytes,
                        ));
                    }
                }
            }
        }
    }

    // Fall back to GCS
    if let Some(ref gcs) = state.gcs {
        let bucket = format!("projects/_/buckets/{}", state.gcs_bucket);
        match gcs.read_object(&bucket, &path).send().await {
            Ok(mut resp) => {
                let mut data = Vec::new();
                while let Some(chunk) = resp.next().await {
                    data.extend_from_slice(&chunk.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?);
                }
                return Ok((
                    [
                        (header::CONTENT_TYPE, content_type),
                        (header::CACHE_CONTROL, cache_control),
                    ],
                    data,
                ));
            }
            Err(_) => return Err(StatusCode::NOT_FOUND),
        }
    }

    Err(StatusCode::NOT_FOUND)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(filter)
        .init();

    let port = std::env::var("MEDIA_SERVER_PORT").unwrap_or_else(|_| "3001".to_string());
    let local_storage_path = std::env::var("LOCAL_STORAGE_PATH").ok().map(PathBuf::from);
    let gcs_bucket =
        std::env::var("GCS_BUCKET_NAME").unwrap_or_else(|_| "publora_media".to_string());

    // Initialize GCS client if credentials are available
    let gcs = match Storage::builder().build().await {
        Ok(client) => {
            info!("GCS client initialized");
            Some(client)
        }
        Err(e) => {
            info!("GCS not available: {}", e);
            None
        }
    };

    if local_storage_path.is_none() && gcs.is_none() {
        warn!("No storage backend configured.");
        warn!("Set LOCAL_STORAGE_PATH and/or GOOGLE_APPLICATION_CREDENTIALS.");
    }

    if let Some(ref path) = local_storage_path {
        info!("Local storage: {:?}", path);
    }

    let state = Arc::new(MediaState {
        local_storage_path,
        gcs,
        gcs_bucket,
    });

    let app = Router::new()
        .route("/{*path}", get(serve_file))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
