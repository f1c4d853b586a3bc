//! Media asset domain - uploads attached to a post group
//!
//! Assets are created in `pending` state when an upload target is issued and
//! flip to `uploaded` exactly once when the bytes arrive, which is what makes
//! the pre-signed target single-use.

use chrono::{DateTime, Utc};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Executor, Postgres, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    Pending,
    Uploaded,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Uploaded => "uploaded",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "uploaded" => MediaStatus::Uploaded,
            _ => MediaStatus::Pending,
        }
    }
}

impl Type<Postgres> for MediaStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for MediaStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Ok(MediaStatus::from_str(&s))
    }
}

impl Encode<'_, Postgres> for MediaStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaAsset {
    pub media_id: String,
    pub post_group_id: String,
    pub file_name: String,
    pub content_type: String,
    pub storage_path: String,
    pub file_url: String,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

const MEDIA_COLUMNS: &str = "media_id, post_group_id, file_name, content_type, storage_path, \
     file_url, status, created_at, uploaded_at";

pub async fn insert_media_asset<'e, E>(
    executor: E,
    media_id: &str,
    post_group_id: &str,
    file_name: &str,
    content_type: &str,
    storage_path: &str,
    file_url: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO media_assets
             (media_id, post_group_id, file_name, content_type, storage_path, file_url, status)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending')",
    )
    .bind(media_id)
    .bind(post_group_id)
    .bind(file_name)
    .bind(content_type)
    .bind(storage_path)
    .bind(file_url)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_media_asset<'e, E>(
    executor: E,
    media_id: &str,
) -> Result<Option<MediaAsset>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM media_assets WHERE media_id = $1",
        MEDIA_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(media_id)
        .fetch_optional(executor)
        .await
}

/// Current (image, video) attachment counts for a group, pending included -
/// an issued-but-unfinished upload still occupies a media slot.
pub async fn count_assets_by_kind<'e, E>(
    executor: E,
    post_group_id: &str,
) -> Result<(i64, i64), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (images, videos): (i64, i64) = sqlx::query_as(
        "SELECT
             COUNT(*) FILTER (WHERE content_type LIKE 'image/%'),
             COUNT(*) FILTER (WHERE content_type LIKE 'video/%')
         FROM media_assets WHERE post_group_id = $1",
    )
    .bind(post_group_id)
    .fetch_one(executor)
    .await?;

    Ok((images, videos))
}

/// Flip a pending asset to uploaded. Returns false when the asset was
/// already consumed (the upload target is single-use).
pub async fn mark_media_uploaded<'e, E>(executor: E, media_id: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE media_assets SET status = 'uploaded', uploaded_at = NOW()
         WHERE media_id = $1 AND status = 'pending'",
    )
    .bind(media_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Uploaded assets available to the publisher for a group
pub async fn list_uploaded_media<'e, E>(
    executor: E,
    post_group_id: &str,
) -> Result<Vec<MediaAsset>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM media_assets
         WHERE post_group_id = $1 AND status = 'uploaded'
         ORDER BY created_at ASC",
        MEDIA_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(post_group_id)
        .fetch_all(executor)
        .await
}

/// Storage paths for a group's assets (for blob cleanup before a cascade
/// delete removes the rows)
pub async fn list_media_paths<'e, E>(
    executor: E,
    post_group_id: &str,
) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT storage_path FROM media_assets WHERE post_group_id = $1")
            .bind(post_group_id)
            .fetch_all(executor)
            .await?;

    Ok(rows.into_iter().map(|(p,)| p).collect())
}
