//! Threads publisher (container flow, same shape as Instagram's)

use reqwest::Client;
use serde::Deserialize;

use super::{PublishError, PublishRequest, PublishSuccess, classify_response, limits};
use crate::domain::connections::{Platform, PlatformConnection};

const THREADS_API_BASE: &str = "https://graph.threads.net/v1.0";

#[derive(Debug, Deserialize)]
struct CreationResponse {
    id: String,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Threads);
    limits.check_media(&req.media)?;
    let text = limits.clamp_text(&req.content);

    let user_id = conn.native_id();

    let mut body = serde_json::json!({ "text": text });
    match req.media.first() {
        None => {
            body["media_type"] = serde_json::json!("TEXT");
        }
        Some(attachment) if attachment.is_video() => {
            body["media_type"] = serde_json::json!("VIDEO");
            body["video_url"] = serde_json::json!(attachment.file_url);
        }
        Some(attachment) => {
            body["media_type"] = serde_json::json!("IMAGE");
            body["image_url"] = serde_json::json!(attachment.file_url);
        }
    }

    let resp = http
        .post(format!("{}/{}/threads", THREADS_API_BASE, user_id))
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let creation: CreationResponse = resp.json().await?;

    let publish_body = serde_json::json!({ "creation_id": creation.id });
    let resp = http
        .post(format!("{}/{}/threads_publish", THREADS_API_BASE, user_id))
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .json(&publish_body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let published: CreationResponse = resp.json().await?;
    let published_url = format!(
        "https://www.threads.net/@{}/post/{}",
        conn.username, published.id
    );

    Ok(PublishSuccess {
        posted_id: published.id,
        published_url,
    })
}
