//! Platform publisher adapters.
//!
//! One module per platform in the closed [`Platform`] set. The reference
//! format is parsed once into the enum (see
//! [`crate::domain::connections::split_platform_id`]); everything here
//! dispatches on that enum, never on string prefixes. Each adapter enforces
//! its platform's limits, truncates a copy of the content, and translates
//! the generic post model into the platform's publish call.

pub mod bluesky;
pub mod facebook;
pub mod instagram;
pub mod limits;
pub mod linkedin;
pub mod mastodon;
pub mod telegram;
pub mod threads;
pub mod tiktok;
pub mod twitter;
pub mod youtube;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::constants::PLATFORM_CALL_TIMEOUT_SECS;
use crate::domain::connections::{Platform, PlatformConnection};

/// An uploaded media asset available to adapters at publish time
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub file_url: String,
    pub content_type: String,
}

impl MediaAttachment {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }
}

/// The generic post model handed to every adapter. `content` is a copy of
/// the group's content; adapters may truncate it, the original is never
/// mutated.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub content: String,
    pub media: Vec<MediaAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSuccess {
    /// Platform-native post identifier, kept for later analytics lookups
    pub posted_id: String,
    pub published_url: String,
}

/// Publish failures, split by whether a retry can help
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("rate limited by platform: {0}")]
    RateLimited(String),
    #[error("platform request timed out")]
    Timeout,
    #[error("platform unavailable: {0}")]
    Unavailable(String),
    #[error("access token expired or revoked")]
    TokenExpired,
    #[error("platform rejected the post: {0}")]
    Rejected(String),
}

impl PublishError {
    /// Transient failures are retried with backoff; permanent ones fail the
    /// post immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PublishError::RateLimited(_) | PublishError::Timeout | PublishError::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PublishError::Timeout
        } else if e.is_connect() {
            PublishError::Unavailable(e.to_string())
        } else {
            PublishError::Rejected(e.to_string())
        }
    }
}

/// Map a non-success platform response to a publish error
pub(crate) fn classify_response(status: reqwest::StatusCode, body: String) -> PublishError {
    match status.as_u16() {
        429 => PublishError::RateLimited(body),
        401 | 403 => PublishError::TokenExpired,
        408 => PublishError::Timeout,
        s if s >= 500 => PublishError::Unavailable(body),
        _ => PublishError::Rejected(body),
    }
}

/// Pull an attachment's bytes from storage for platforms that require a
/// direct upload rather than a URL.
pub(crate) async fn fetch_media_bytes(
    http: &Client,
    attachment: &MediaAttachment,
) -> Result<Vec<u8>, PublishError> {
    let resp = http.get(&attachment.file_url).send().await?;
    if !resp.status().is_success() {
        return Err(PublishError::Unavailable(format!(
            "media fetch failed: {}",
            resp.status()
        )));
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Seam between the publish pipeline and the real platform APIs; tests
/// substitute fakes.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        connection: &PlatformConnection,
        request: &PublishRequest,
    ) -> Result<PublishSuccess, PublishError>;
}

/// Real adapter dispatch over the closed platform set
#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
}

impl PlatformClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(PLATFORM_CALL_TIMEOUT_SECS))
            .build()
            .expect("failed to build platform HTTP client");
        Self { http }
    }
}

impl Default for PlatformClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for PlatformClient {
    async fn publish(
        &self,
        connection: &PlatformConnection,
        request: &PublishRequest,
    ) -> Result<PublishSuccess, PublishError> {
        // Refreshing tokens is the connect flow's job; a stale token here is
        // a permanent failure, not something to retry.
        if let Some(expiry) = connection.access_token_expires_at {
            if expiry <= chrono::Utc::now() {
                return Err(PublishError::TokenExpired);
            }
        }

        match connection.platform {
            Platform::Twitter => twitter::publish(&self.http, connection, request).await,
            Platform::Linkedin => linkedin::publish(&self.http, connection, request).await,
            Platform::Instagram => instagram::publish(&self.http, connection, request).await,
            Platform::Threads => threads::publish(&self.http, connection, request).await,
            Platform::Tiktok => tiktok::publish(&self.http, connection, request).await,
            Platform::Youtube => youtube::publish(&self.http, connection, request).await,
            Platform::Facebook => facebook::publish(&self.http, connection, request).await,
            Platform::Bluesky => bluesky::publish(&self.http, connection, request).await,
            Platform::Mastodon => mastodon::publish(&self.http, connection, request).await,
            Platform::Telegram => telegram::publish(&self.http, connection, request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(classify_response(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_response(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(classify_response(StatusCode::REQUEST_TIMEOUT, String::new()).is_transient());
    }

    #[test]
    fn auth_and_validation_failures_are_permanent() {
        assert!(!classify_response(StatusCode::UNAUTHORIZED, String::new()).is_transient());
        assert!(!classify_response(StatusCode::FORBIDDEN, String::new()).is_transient());
        assert!(
            !classify_response(StatusCode::UNPROCESSABLE_ENTITY, String::new()).is_transient()
        );
        assert!(!classify_response(StatusCode::BAD_REQUEST, String::new()).is_transient());
    }
}
