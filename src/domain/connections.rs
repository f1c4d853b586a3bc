//! Platform connection domain - models and DB queries
//!
//! Connections are written by the external OAuth connect flow; this service
//! treats them as read-only publish targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Executor, Postgres, Type};

/// The closed set of platforms posts can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Linkedin,
    Instagram,
    Threads,
    Tiktok,
    Youtube,
    Facebook,
    Bluesky,
    Mastodon,
    Telegram,
}

impl Platform {
    pub const ALL: [Platform; 10] = [
        Platform::Twitter,
        Platform::Linkedin,
        Platform::Instagram,
        Platform::Threads,
        Platform::Tiktok,
        Platform::Youtube,
        Platform::Facebook,
        Platform::Bluesky,
        Platform::Mastodon,
        Platform::Telegram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
            Platform::Threads => "threads",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
            Platform::Facebook => "facebook",
            Platform::Bluesky => "bluesky",
            Platform::Mastodon => "mastodon",
            Platform::Telegram => "telegram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "twitter" => Some(Platform::Twitter),
            "linkedin" => Some(Platform::Linkedin),
            "instagram" => Some(Platform::Instagram),
            "threads" => Some(Platform::Threads),
            "tiktok" => Some(Platform::Tiktok),
            "youtube" => Some(Platform::Youtube),
            "facebook" => Some(Platform::Facebook),
            "bluesky" => Some(Platform::Bluesky),
            "mastodon" => Some(Platform::Mastodon),
            "telegram" => Some(Platform::Telegram),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// sqlx Type/Decode/Encode over TEXT to enable FromRow on connection and post
// models. Unknown values in the database are a decode error, not a default.
impl Type<Postgres> for Platform {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Platform {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Platform::parse(&s).ok_or_else(|| format!("unknown platform: {}", s).into())
    }
}

impl Encode<'_, Postgres> for Platform {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

/// Split a `"{platform}-{opaque-id}"` connection reference into its parts.
///
/// This is the one place the reference format is interpreted; everything
/// downstream dispatches on the returned enum.
pub fn split_platform_id(platform_id: &str) -> Option<(Platform, &str)> {
    let (prefix, rest) = platform_id.split_once('-')?;
    if rest.is_empty() {
        return None;
    }
    Platform::parse(prefix).map(|p| (p, rest))
}

/// An authorized social account usable as a publish target
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformConnection {
    pub platform_id: String,
    pub platform: Platform,
    pub username: String,
    pub display_name: String,
    pub profile_image_url: Option<String>,
    pub access_token: String,
    pub access_token_expires_at: Option<DateTime<Utc>>,
}

impl PlatformConnection {
    /// The platform-native account identifier: the part of the reference
    /// after the `{platform}-` prefix.
    pub fn native_id(&self) -> &str {
        self.platform_id
            .split_once('-')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.platform_id)
    }
}

const CONNECTION_COLUMNS: &str = "platform_id, platform, username, display_name, \
     profile_image_url, access_token, access_token_expires_at";

/// List connections visible to the acting user (account-level when no
/// workspace user is acting).
pub async fn list_connections<'e, E>(
    executor: E,
    account_id: i64,
    workspace_user_id: Option<&str>,
) -> Result<Vec<PlatformConnection>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM platform_connections
         WHERE account_id = $1 AND workspace_user_id IS NOT DISTINCT FROM $2
         ORDER BY created_at ASC",
        CONNECTION_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(account_id)
        .bind(workspace_user_id)
        .fetch_all(executor)
        .await
}

/// Resolve a single connection reference for the acting user
pub async fn get_connection<'e, E>(
    executor: E,
    account_id: i64,
    workspace_user_id: Option<&str>,
    platform_id: &str,
) -> Result<Option<PlatformConnection>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM platform_connections
         WHERE account_id = $1 AND workspace_user_id IS NOT DISTINCT FROM $2
           AND platform_id = $3",
        CONNECTION_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(account_id)
        .bind(workspace_user_id)
        .bind(platform_id)
        .fetch_optional(executor)
        .await
}

/// Resolve a connection by reference alone (publish worker path; ownership
/// was checked when the post group was created).
pub async fn get_connection_by_platform_id<'e, E>(
    executor: E,
    platform_id: &str,
) -> Result<Option<PlatformConnection>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM platform_connections WHERE platform_id = $1",
        CONNECTION_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(platform_id)
        .fetch_optional(executor)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_platform_references() {
        assert_eq!(
            split_platform_id("twitter-1"),
            Some((Platform::Twitter, "1"))
        );
        assert_eq!(
            split_platform_id("linkedin-abc-def"),
            Some((Platform::Linkedin, "abc-def"))
        );
    }

    #[test]
    fn rejects_malformed_references() {
        assert_eq!(split_platform_id("twitter"), None);
        assert_eq!(split_platform_id("twitter-"), None);
        assert_eq!(split_platform_id("myspace-42"), None);
        assert_eq!(split_platform_id(""), None);
    }

    #[test]
    fn platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(Platform::parse(platform.as_str()), Some(platform));
        }
    }
}
