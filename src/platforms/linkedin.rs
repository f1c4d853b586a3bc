//! LinkedIn publisher

use reqwest::Client;

use super::{PublishError, PublishRequest, PublishSuccess, classify_response, limits};
use crate::domain::connections::{Platform, PlatformConnection};

const LINKEDIN_API_BASE: &str = "https://api.linkedin.com/rest";
const LINKEDIN_VERSION: &str = "202411";

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Linkedin);
    limits.check_media(&req.media)?;
    let commentary = limits.clamp_text(&req.content);

    let author = format!("urn:li:person:{}", conn.native_id());
    let mut body = serde_json::json!({
        "author": author,
        "commentary": commentary,
        "visibility": "PUBLIC",
        "distribution": {
            "feedDistribution": "MAIN_FEED",
            "targetEntities": [],
            "thirdPartyDistributionChannels": []
        },
        "lifecycleState": "PUBLISHED",
        "isReshareDisabledByAuthor": false
    });

    // LinkedIn accepts media by URL through article-style content; a single
    // attachment rides along, extra images are dropped by the platform.
    if let Some(first) = req.media.first() {
        body["content"] = serde_json::json!({
            "media": { "id": first.file_url }
        });
    }

    let resp = http
        .post(format!("{}/posts", LINKEDIN_API_BASE))
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .header("LinkedIn-Version", LINKEDIN_VERSION)
        .header("X-Restli-Protocol-Version", "2.0.0")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    // The created share URN comes back in the x-restli-id header.
    let urn = resp
        .headers()
        .get("x-restli-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PublishError::Rejected("missing x-restli-id in response".to_string()))?
        .to_string();

    let posted_id = urn.rsplit(':').next().unwrap_or(&urn).to_string();
    let published_url = format!("https://www.linkedin.com/feed/update/{}", urn);

    Ok(PublishSuccess {
        posted_id,
        published_url,
    })
}
