//! Twitter (X) publisher

use reqwest::Client;
use serde::Deserialize;

use super::{
    MediaAttachment, PublishError, PublishRequest, PublishSuccess, classify_response,
    fetch_media_bytes, limits,
};
use crate::domain::connections::{Platform, PlatformConnection};

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    data: MediaUploadData,
}

#[derive(Debug, Deserialize)]
struct MediaUploadData {
    id: String,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Twitter);
    limits.check_media(&req.media)?;
    let text = limits.clamp_text(&req.content);

    let mut media_ids = Vec::with_capacity(req.media.len());
    for attachment in &req.media {
        media_ids.push(upload_media(http, &conn.access_token, attachment).await?);
    }

    let mut body = serde_json::json!({ "text": text });
    if !media_ids.is_empty() {
        body["media"] = serde_json::json!({ "media_ids": media_ids });
    }

    let resp = http
        .post("https://api.x.com/2/tweets")
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let wrapper: TweetResponseWrapper = resp.json().await?;
    let posted_id = wrapper.data.id;
    let published_url = format!("https://x.com/{}/status/{}", conn.username, posted_id);

    Ok(PublishSuccess {
        posted_id,
        published_url,
    })
}

/// Simple (non-chunked) upload; tweet media stays well under the size that
/// requires the INIT/APPEND/FINALIZE flow.
async fn upload_media(
    http: &Client,
    access_token: &str,
    attachment: &MediaAttachment,
) -> Result<String, PublishError> {
    let data = fetch_media_bytes(http, attachment).await?;

    let media_category = if attachment.is_video() {
        "tweet_video"
    } else if attachment.content_type == "image/gif" {
        "tweet_gif"
    } else {
        "tweet_image"
    };

    let part = reqwest::multipart::Part::bytes(data)
        .mime_str(&attachment.content_type)
        .map_err(|e| PublishError::Rejected(format!("invalid mime type: {}", e)))?;

    let form = reqwest::multipart::Form::new()
        .text("media_category", media_category.to_string())
        .text("media_type", attachment.content_type.clone())
        .part("media", part);

    let resp = http
        .post("https://api.x.com/2/media/upload")
        .header("Authorization", format!("Bearer {}", access_token))
        .multipart(form)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let wrapper: MediaUploadResponse = resp.json().await?;
    Ok(wrapper.data.id)
}
