//! Facebook publisher (page feed via the Graph API)

use reqwest::Client;
use serde::Deserialize;

use super::{PublishError, PublishRequest, PublishSuccess, classify_response, limits};
use crate::domain::connections::{Platform, PlatformConnection};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";

#[derive(Debug, Deserialize)]
struct GraphIdResponse {
    id: String,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Facebook);
    limits.check_media(&req.media)?;
    let message = limits.clamp_text(&req.content);

    let page_id = conn.native_id();

    if let Some(video) = req.media.iter().find(|m| m.is_video()) {
        let body = serde_json::json!({
            "description": message,
            "file_url": video.file_url,
        });
        let id = post_graph(http, conn, &format!("{}/{}/videos", GRAPH_API_BASE, page_id), &body)
            .await?;
        let published_url = format!("https://www.facebook.com/{}", id);
        return Ok(PublishSuccess {
            posted_id: id,
            published_url,
        });
    }

    // Images upload unpublished first, then attach to a single feed post.
    let mut attached_media = Vec::new();
    for attachment in req.media.iter().filter(|m| m.is_image()) {
        let body = serde_json::json!({
            "url": attachment.file_url,
            "published": false,
        });
        let photo_id = post_graph(
            http,
            conn,
            &format!("{}/{}/photos", GRAPH_API_BASE, page_id),
            &body,
        )
        .await?;
        attached_media.push(serde_json::json!({ "media_fbid": photo_id }));
    }

    let mut body = serde_json::json!({ "message": message });
    if !attached_media.is_empty() {
        body["attached_media"] = serde_json::json!(attached_media);
    }

    let id = post_graph(http, conn, &format!("{}/{}/feed", GRAPH_API_BASE, page_id), &body).await?;
    let published_url = format!("https://www.facebook.com/{}", id);

    Ok(PublishSuccess {
        posted_id: id,
        published_url,
    })
}

async fn post_graph(
    http: &Client,
    conn: &PlatformConnection,
    url: &str,
    body: &serde_json::Value,
) -> Result<String, PublishError> {
    let resp = http
        .post(url)
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .json(body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let parsed: GraphIdResponse = resp.json().await?;
    Ok(parsed.id)
}
