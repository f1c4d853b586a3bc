//! Telegram publisher (Bot API)
//!
//! The connection's access token is the bot token and its native id is the
//! target chat.

use reqwest::Client;
use serde::Deserialize;

use super::{PublishError, PublishRequest, PublishSuccess, classify_response, limits};
use crate::domain::connections::{Platform, PlatformConnection};

#[derive(Debug, Deserialize)]
struct SendResponse {
    result: SentMessage,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub(super) async fn publish(
    http: &Client,
    conn: &PlatformConnection,
    req: &PublishRequest,
) -> Result<PublishSuccess, PublishError> {
    let limits = limits::limits_for(Platform::Telegram);
    limits.check_media(&req.media)?;
    let text = limits.clamp_text(&req.content);

    let chat_id = conn.native_id();
    let api_base = format!("https://api.telegram.org/bot{}", conn.access_token);

    let (method, body) = match req.media.first() {
        None => (
            "sendMessage",
            serde_json::json!({ "chat_id": chat_id, "text": text }),
        ),
        Some(attachment) if attachment.is_video() => (
            "sendVideo",
            serde_json::json!({
                "chat_id": chat_id,
                "video": attachment.file_url,
                "caption": text,
            }),
        ),
        Some(attachment) => (
            "sendPhoto",
            serde_json::json!({
                "chat_id": chat_id,
                "photo": attachment.file_url,
                "caption": text,
            }),
        ),
    };

    let resp = http
        .post(format!("{}/{}", api_base, method))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(classify_response(status, text));
    }

    let sent: SendResponse = resp.json().await?;
    let posted_id = sent.result.message_id.to_string();
    let published_url = format!("https://t.me/{}/{}", conn.username, posted_id);

    Ok(PublishSuccess {
        posted_id,
        published_url,
    })
}
