//! TikTok publisher (Content Posting API, PULL_FROM_URL source)

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{PublishError, PublishRequest, PublishSuccess, classify_response, limits};
use crate::domain::connections::{Platform, PlatformConnection};

const TIKTOK_API_BASE: &str = "https://open.tiktokapis.com/v2";

/// Post settings TikTok requires on every publish call. Absent explicit user
/// preferences these documented defaults are sent: public visibility with
/// comments, duets and stitches left enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TikTokOptions {
    pub privacy_level: &'static str,
    pub disable_comment: bool,
    pub disable_duet: bool,
    pub disable_stitch: bool,
}

impl Default for TikTokOptions {
    fn default() -> Self {
        Self {
            privacy_level: "PUBLIC_TO_EVERYONE",
            disable_comment: false,
            disable_duet: false,
            disable_stitch: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    data: InitData,
}

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: String,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Tiktok);
    limits.check_media(&req.media)?;
    let title = limits.clamp_text(&req.content);

    let options = TikTokOptions::default();
    let video = req.media.iter().find(|m| m.is_video());
    let images: Vec<&str> = req
        .media
        .iter()
        .filter(|m| m.is_image())
        .map(|m| m.file_url.as_str())
        .collect();

    let (endpoint, body) = if let Some(video) = video {
        (
            format!("{}/post/publish/video/init/", TIKTOK_API_BASE),
            serde_json::json!({
                "post_info": {
                    "title": title,
                    "privacy_level": options.privacy_level,
                    "disable_comment": options.disable_comment,
                    "disable_duet": options.disable_duet,
                    "disable_stitch": options.disable_stitch,
                },
                "source_info": {
                    "source": "PULL_FROM_URL",
                    "video_url": video.file_url,
                }
            }),
        )
    } else if !images.is_empty() {
        (
            format!("{}/post/publish/content/init/", TIKTOK_API_BASE),
            serde_json::json!({
                "post_info": {
                    "title": title,
                    "privacy_level": options.privacy_level,
                    "disable_comment": options.disable_comment,
                },
                "source_info": {
                    "source": "PULL_FROM_URL",
                    "photo_images": images,
                },
                "post_mode": "DIRECT_POST",
                "media_type": "PHOTO",
            }),
        )
    } else {
        return Err(PublishError::Rejected(
            "TikTok requires a video or at least one image".to_string(),
        ));
    };

    let resp = http
        .post(&endpoint)
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .header("Content-Type", "application/json; charset=UTF-8")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let init: InitResponse = resp.json().await?;
    let posted_id = init.data.publish_id;
    let published_url = format!("https://www.tiktok.com/@{}", conn.username);

    Ok(PublishSuccess {
        posted_id,
        published_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_public_with_interactions_enabled() {
        let options = TikTokOptions::default();
        assert_eq!(options.privacy_level, "PUBLIC_TO_EVERYONE");
        assert!(!options.disable_comment);
        assert!(!options.disable_duet);
        assert!(!options.disable_stitch);
    }
}
