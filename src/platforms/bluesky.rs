//! Bluesky publisher (AT Protocol XRPC)

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use super::{
    PublishError, PublishRequest, PublishSuccess, classify_response, fetch_media_bytes, limits,
};
use crate::domain::connections::{Platform, PlatformConnection};

const BLUESKY_PDS: &str = "https://bsky.social";

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct UploadBlobResponse {
    blob: serde_json::Value,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Bluesky);
    limits.check_media(&req.media)?;
    let text = limits.clamp_text(&req.content);

    // The connection's native id is the account DID.
    let did = conn.native_id();

    let mut record = serde_json::json!({
        "$type": "app.bsky.feed.post",
        "text": text,
        "createdAt": Utc::now().to_rfc3339(),
    });

    let images: Vec<_> = req.media.iter().filter(|m| m.is_image()).collect();
    if !images.is_empty() {
        let mut embeds = Vec::with_capacity(images.len());
        for attachment in images {
            let data = fetch_media_bytes(http, attachment).await?;
            let blob = upload_blob(http, conn, data, &attachment.content_type).await?;
            embeds.push(serde_json::json!({ "image": blob, "alt": "" }));
        }
        record["embed"] = serde_json::json!({
            "$type": "app.bsky.embed.images",
            "images": embeds,
        });
    }

    let body = serde_json::json!({
        "repo": did,
        "collection": "app.bsky.feed.post",
        "record": record,
    });

    let resp = http
        .post(format!("{}/xrpc/com.atproto.repo.createRecord", BLUESKY_PDS))
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let created: CreateRecordResponse = resp.json().await?;
    // at://did:plc:.../app.bsky.feed.post/<rkey>
    let rkey = created
        .uri
        .rsplit('/')
        .next()
        .unwrap_or(&created.uri)
        .to_string();
    let published_url = format!("https://bsky.app/profile/{}/post/{}", conn.username, rkey);

    Ok(PublishSuccess {
        posted_id: rkey,
        published_url,
    })
}

async fn upload_blob(
    http: &Client,
    conn: &PlatformConnection,
    data: Vec<u8>,
    content_type: &str,
) -> Result<serde_json::Value, PublishError> {
    let resp = http
        .post(format!("{}/xrpc/com.atproto.repo.uploadBlob", BLUESKY_PDS))
        .header("Authorization", format!("Bearer {}", conn.access_token))
        .header("Content-Type", content_type)
        .body(data)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let uploaded: UploadBlobResponse = resp.json().await?;
    Ok(uploaded.blob)
}
