//! Instagram publisher (Graph API container flow)
//!
//! Instagram publishes in two steps: create a media container, then publish
//! it. Multi-image posts build child containers first and wrap them in a
//! carousel.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{PublishError, PublishRequest, PublishSuccess, classify_response, limits};
use crate::domain::connections::{Platform, PlatformConnection};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// Container settings applied to every Instagram publish. Video posts land
/// as Reels, which is the only video surface the Graph API still offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstagramOptions {
    pub video_media_type: &'static str,
    pub share_to_feed: bool,
}

impl Default for InstagramOptions {
    fn default() -> Self {
        Self {
            video_media_type: "REELS",
            share_to_feed: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreationResponse {
    id: String,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Instagram);
    limits.check_media(&req.media)?;
    let caption = limits.clamp_text(&req.content);

    if req.media.is_empty() {
        return Err(PublishError::Rejected(
            "Instagram requires at least one image or video".to_string(),
        ));
    }

    let options = InstagramOptions::default();
    let user_id = conn.native_id();

    let creation_id = if req.media.len() == 1 {
        create_container(http, conn, user_id, &req.media[0], Some(&caption), &options, false)
            .await?
    } else {
        let mut children = Vec::with_capacity(req.media.len());
        for attachment in &req.media {
            children
                .push(create_container(http, conn, user_id, attachment, None, &options, true).await?);
        }

        let body = serde_json::json!({
            "media_type": "CAROUSEL",
            "children": children,
            "caption": caption,
        });
        post_graph(http, conn, &format!("{}/{}/media", GRAPH_API_BASE, user_id), &body).await?
    };

    // Step 2: publish the container.
    let body = serde_json::json!({ "creation_id": creation_id });
    let media_id = post_graph(
        http,
        conn,
        &format!("{}/{}/media_publish", GRAPH_API_BASE, user_id),
        &body,
    )
    .await?;

    let published_url = format!("https://www.instagram.com/p/{}/", media_id);

    Ok(PublishSuccess {
        posted_id: media_id,
        published_url,
    })
}

async fn create_container(
    http: &Client,
    conn: &PlatformConnection,
    user_id: &str,
    attachment: &super::MediaAttachment,
    caption: Option<&str>,
    options: &InstagramOptions,
    is_carousel_item: bool,
) -> Result<String, PublishError> {
    let mut body = if attachment.is_video() {
        serde_json::json!({
            "media_type": options.video_media_type,
            "video_url": attachment.file_url,
            "share_to_feed": options.share_to_feed,
        })
    } else {
        serde_json::json!({ "image_url": attachment.file_url })
    };

    if let Some(caption) = caption {
        body["caption"] = serde_json::json!(caption);
    }
    if is_carousel_item {
        body["is_carousel_item"] = serde_json::json!(true);
    }

    post_graph(http, conn, &format!("{}/{}/media", GRAPH_API_BASE, user_id), &body).await
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

    let creation: CreationResponse = resp.json().await?;
    Ok(creation.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_posts_default_to_reels() {
        let options = InstagramOptions::default();
        assert_eq!(options.video_media_type, "REELS");
        assert!(options.share_to_feed);
    }
}
