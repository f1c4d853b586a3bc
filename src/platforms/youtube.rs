//! YouTube publisher (videos.insert multipart upload)

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    PublishError, PublishRequest, PublishSuccess, classify_response, fetch_media_bytes, limits,
};
use crate::domain::connections::{Platform, PlatformConnection};

const YOUTUBE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=multipart&part=snippet,status";

/// Upload settings applied to every YouTube publish: public visibility and
/// no synthesized title (the description carries the post content).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YouTubeOptions {
    pub privacy_status: &'static str,
    pub default_title: &'static str,
}

impl Default for YouTubeOptions {
    fn default() -> Self {
        Self {
            privacy_status: "public",
            default_title: "",
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    id: String,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Youtube);
    limits.check_media(&req.media)?;
    let description = limits.clamp_text(&req.content);

    let Some(video) = req.media.iter().find(|m| m.is_video()) else {
        return Err(PublishError::Rejected(
            "YouTube requires a video attachment".to_string(),
        ));
    };

    let options = YouTubeOptions::default();
    let metadata = serde_json::json!({
        "snippet": {
            "title": options.default_title,
            "description": description,
        },
        "status": {
            "privacyStatus": options.privacy_status,
        }
    });

    let data = fetch_media_bytes(http, video).await?;

    let metadata_part = reqwest::multipart::Part::text(metadata.to_string())
        .mime_str("application/json; charset=UTF-8")
        .map_err(|e| PublishError::Rejected(format!("invalid metadata part: {}", e)))?;
    let video_part = reqwest::multipart::Part::bytes(data)
        .mime_str(&video.content_type)
        .map_err(|e| PublishError::Rejected(format!("invalid mime type: {}", e)))?;

    let form = reqwest::multipart::Form::new()
        .part("snippet", metadata_part)
        .part("video", video_part);

    let resp = http
        .post(YOUTUBE_UPLOAD_URL)
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .multipart(form)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let video_resp: VideoResponse = resp.json().await?;
    let published_url = format!("https://www.youtube.com/watch?v={}", video_resp.id);

    Ok(PublishSuccess {
        posted_id: video_resp.id,
        published_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_public_with_empty_title() {
        let options = YouTubeOptions::default();
        assert_eq!(options.privacy_status, "public");
        assert_eq!(options.default_title, "");
    }
}
