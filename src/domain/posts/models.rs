//! Post group and per-platform post models
//!
//! A post group is the unit of scheduling: one content body fanned out to one
//! post per platform connection. Group status is never stored independently
//! of its posts once publishing starts - it is the aggregate of their
//! terminal states (see [`aggregate_status`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};

use crate::domain::connections::Platform;

/// Lifecycle of a post group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Draft,
    Scheduled,
    Processing,
    Published,
    Failed,
    PartiallyPublished,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Draft => "draft",
            GroupStatus::Scheduled => "scheduled",
            GroupStatus::Processing => "processing",
            GroupStatus::Published => "published",
            GroupStatus::Failed => "failed",
            GroupStatus::PartiallyPublished => "partially_published",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "draft" => GroupStatus::Draft,
            "scheduled" => GroupStatus::Scheduled,
            "processing" => GroupStatus::Processing,
            "published" => GroupStatus::Published,
            "failed" => GroupStatus::Failed,
            "partially_published" => GroupStatus::PartiallyPublished,
            _ => GroupStatus::Draft,
        }
    }

    /// Mutable statuses accept update/delete; processing and the terminal
    /// states do not.
    pub fn is_mutable(&self) -> bool {
        matches!(self, GroupStatus::Draft | GroupStatus::Scheduled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GroupStatus::Published | GroupStatus::Failed | GroupStatus::PartiallyPublished
        )
    }
}

/// Lifecycle of a single per-platform post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Scheduled,
    Processing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Processing => "processing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "scheduled" => PostStatus::Scheduled,
            "processing" => PostStatus::Processing,
            "published" => PostStatus::Published,
            "failed" => PostStatus::Failed,
            _ => PostStatus::Scheduled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

// sqlx Type/Decode/Encode over TEXT for both status enums, enabling FromRow
// on the models below.
macro_rules! impl_pg_text_enum {
    ($ty:ty) => {
        impl Type<Postgres> for $ty {
            fn type_info() -> PgTypeInfo {
                <String as Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                let s = <String as Decode<Postgres>>::decode(value)?;
                Ok(<$ty>::from_str(&s))
            }
        }

        impl Encode<'_, Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
                <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
            }
        }
    };
}

impl_pg_text_enum!(GroupStatus);
impl_pg_text_enum!(PostStatus);

/// A scheduled post group
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostGroup {
    pub post_group_id: String,
    pub account_id: i64,
    pub workspace_user_id: Option<String>,
    pub content: String,
    pub status: GroupStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single platform publish attempt belonging to exactly one group
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformPost {
    pub id: i64,
    pub post_group_id: String,
    pub platform: Platform,
    pub platform_connection_id: String,
    pub status: PostStatus,
    pub posted_id: Option<String>,
    pub published_url: Option<String>,
    pub error: Option<String>,
    pub publish_attempts: i32,
}

/// Roll per-platform outcomes up into a group status.
///
/// Deterministic and idempotent: recomputing over the same slice always
/// yields the same answer. The group only finalizes once every post has
/// reached a terminal state; until then it stays `processing`.
pub fn aggregate_status(posts: &[PostStatus]) -> GroupStatus {
    // A group always fans out to at least one post; an empty slice can only
    // mean the posts have not been loaded yet.
    if posts.is_empty() || posts.iter().any(|s| !s.is_terminal()) {
        return GroupStatus::Processing;
    }

    let published = posts
        .iter()
        .filter(|s| **s == PostStatus::Published)
        .count();

    if published == posts.len() {
        GroupStatus::Published
    } else if published == 0 {
        GroupStatus::Failed
    } else {
        GroupStatus::PartiallyPublished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_published_aggregates_to_published() {
        let posts = vec![PostStatus::Published; 3];
        assert_eq!(aggregate_status(&posts), GroupStatus::Published);
    }

    #[test]
    fn all_failed_aggregates_to_failed() {
        let posts = vec![PostStatus::Failed; 2];
        assert_eq!(aggregate_status(&posts), GroupStatus::Failed);
    }

    #[test]
    fn mixed_outcomes_aggregate_to_partially_published() {
        let posts = vec![PostStatus::Published, PostStatus::Failed];
        assert_eq!(aggregate_status(&posts), GroupStatus::PartiallyPublished);

        let posts = vec![
            PostStatus::Failed,
            PostStatus::Published,
            PostStatus::Failed,
        ];
        assert_eq!(aggregate_status(&posts), GroupStatus::PartiallyPublished);
    }

    #[test]
    fn any_non_terminal_post_keeps_the_group_processing() {
        let posts = vec![PostStatus::Published, PostStatus::Processing];
        assert_eq!(aggregate_status(&posts), GroupStatus::Processing);

        let posts = vec![PostStatus::Failed, PostStatus::Scheduled];
        assert_eq!(aggregate_status(&posts), GroupStatus::Processing);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let posts = vec![
            PostStatus::Published,
            PostStatus::Failed,
            PostStatus::Published,
        ];
        let first = aggregate_status(&posts);
        let second = aggregate_status(&posts);
        assert_eq!(first, second);
        assert_eq!(first, GroupStatus::PartiallyPublished);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            GroupStatus::Draft,
            GroupStatus::Scheduled,
            GroupStatus::Processing,
            GroupStatus::Published,
            GroupStatus::Failed,
            GroupStatus::PartiallyPublished,
        ] {
            assert_eq!(GroupStatus::from_str(status.as_str()), status);
        }
    }
}
