//! Mastodon publisher
//!
//! Mastodon is federated, so the instance comes from the connection's
//! `user@instance` username rather than a fixed API base.

use reqwest::Client;
use serde::Deserialize;

use super::{
    PublishError, PublishRequest, PublishSuccess, classify_response, fetch_media_bytes, limits,
};
use crate::domain::connections::{Platform, PlatformConnection};

const DEFAULT_INSTANCE: &str = "mastodon.social";

#[derive(Debug, Deserialize)]
struct StatusResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    id: String,
}

/// Instance domain for a federated `user@instance` handle; bare local
/// usernames fall back to the flagship instance.
fn instance_for(username: &str) -> &str {
    match username.trim_start_matches('@').split_once('@') {
        Some((_, instance)) if !instance.is_empty() => instance,
        _ => DEFAULT_INSTANCE,
    }
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Mastodon);
    limits.check_media(&req.media)?;
    let status = limits.clamp_text(&req.content);

    let instance = instance_for(&conn.username);

    let mut media_ids = Vec::with_capacity(req.media.len());
    for attachment in &req.media {
        let data = fetch_media_bytes(http, attachment).await?;
        let part = reqwest::multipart::Part::bytes(data)
            .file_name("media")
            .mime_str(&attachment.content_type)
            .map_err(|e| PublishError::Rejected(format!("invalid mime type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = http
            .post(format!("https://{}/api/v2/media", instance))
            .header("Authorization", format!("Bearer {}", conn.access_token))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status_code = resp.status();
            let text = resp.text().await?;
            return Err(classify_response(status_code, text));
        }

        let media: MediaResponse = resp.json().await?;
        media_ids.push(media.id);
    }

    let mut body = serde_json::json!({ "status": status });
    if !media_ids.is_empty() {
        body["media_ids"] = serde_json::json!(media_ids);
    }

    let resp = http
        .post(format!("https://{}/api/v1/statuses", instance))
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status_code = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status_code, text));
    }

    let posted: StatusResponse = resp.json().await?;
    let published_url = posted.url.unwrap_or_else(|| {
        format!(
            "https://{}/@{}/{}",
            instance,
            conn.username.trim_start_matches('@'),
            posted.id
        )
    });

    Ok(PublishSuccess {
        posted_id: posted.id,
        published_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn federated_handles_resolve_to_their_instance() {
        assert_eq!(instance_for("erin@fosstodon.org"), "fosstodon.org");
        assert_eq!(instance_for("@erin@hachyderm.io"), "hachyderm.io");
    }

    #[test]
    fn bare_usernames_fall_back_to_the_default_instance() {
        assert_eq!(instance_for("erin"), DEFAULT_INSTANCE);
        assert_eq!(instance_for("erin@"), DEFAULT_INSTANCE);
    }
}
