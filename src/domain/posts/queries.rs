//! Post group store - DB queries for groups and their per-platform posts
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for
//! transactions). The `scheduled -> processing` claim is the single
//! cross-component lock in the system: `FOR UPDATE SKIP LOCKED` plus the
//! status predicate makes that transition at-most-once per group and mutually
//! exclusive with update/delete, which both require a mutable status.

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

use super::models::{GroupStatus, PlatformPost, PostGroup};
use crate::domain::connections::Platform;

const GROUP_COLUMNS: &str = "post_group_id, account_id, workspace_user_id, content, status, \
     scheduled_time, processing_started_at, created_at, updated_at";

const POST_COLUMNS: &str = "id, post_group_id, platform, platform_connection_id, status, \
     posted_id, published_url, error, publish_attempts";

/// Everything needed to persist a new group
#[derive(Debug)]
pub struct NewPostGroup<'a> {
    pub post_group_id: &'a str,
    pub account_id: i64,
    pub workspace_user_id: Option<&'a str>,
    pub content: &'a str,
    pub status: GroupStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    /// (platform, full connection reference) pairs, one post stub each
    pub platforms: &'a [(Platform, String)],
}

/// Atomically persist a group plus one post stub per platform.
pub async fn create_post_group(pool: &PgPool, group: &NewPostGroup<'_>) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO post_groups
             (post_group_id, account_id, workspace_user_id, content, status, scheduled_time)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(group.post_group_id)
    .bind(group.account_id)
    .bind(group.workspace_user_id)
    .bind(group.content)
    .bind(group.status)
    .bind(group.scheduled_time)
    .execute(&mut *tx)
    .await?;

    for (platform, connection_id) in group.platforms {
        sqlx::query(
            "INSERT INTO posts (post_group_id, platform, platform_connection_id, status)
             VALUES ($1, $2, $3, 'scheduled')",
        )
        .bind(group.post_group_id)
        .bind(platform)
        .bind(connection_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Fetch a group scoped to the acting user
pub async fn get_post_group<'e, E>(
    executor: E,
    account_id: i64,
    workspace_user_id: Option<&str>,
    post_group_id: &str,
) -> Result<Option<PostGroup>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM post_groups
         WHERE post_group_id = $1 AND account_id = $2
           AND workspace_user_id IS NOT DISTINCT FROM $3",
        GROUP_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(post_group_id)
        .bind(account_id)
        .bind(workspace_user_id)
        .fetch_optional(executor)
        .await
}

/// Posts belonging to a group, in creation order (mirrors the platforms array)
pub async fn list_posts<'e, E>(
    executor: E,
    post_group_id: &str,
) -> Result<Vec<PlatformPost>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM posts WHERE post_group_id = $1 ORDER BY id ASC",
        POST_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(post_group_id)
        .fetch_all(executor)
        .await
}

/// Reschedule or re-status a group while it is still mutable.
///
/// The status predicate makes this a compare-and-set: a group the worker has
/// already claimed (or that has finished) matches zero rows, which the
/// caller reports as `InvalidTransition`.
pub async fn update_post_group<'e, E>(
    executor: E,
    account_id: i64,
    workspace_user_id: Option<&str>,
    post_group_id: &str,
    scheduled_time: Option<DateTime<Utc>>,
    status: Option<GroupStatus>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE post_groups
         SET scheduled_time = COALESCE($4, scheduled_time),
             status = COALESCE($5, status),
             updated_at = NOW()
         WHERE post_group_id = $1 AND account_id = $2
           AND workspace_user_id IS NOT DISTINCT FROM $3
           AND status IN ('draft', 'scheduled')",
    )
    .bind(post_group_id)
    .bind(account_id)
    .bind(workspace_user_id)
    .bind(scheduled_time)
    .bind(status)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a group (cascades to posts and media rows). Refuses groups that
/// are mid-publish; draft, scheduled and terminal groups all delete cleanly.
pub async fn delete_post_group<'e, E>(
    executor: E,
    account_id: i64,
    workspace_user_id: Option<&str>,
    post_group_id: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "DELETE FROM post_groups
         WHERE post_group_id = $1 AND account_id = $2
           AND workspace_user_id IS NOT DISTINCT FROM $3
           AND status <> 'processing'",
    )
    .bind(post_group_id)
    .bind(account_id)
    .bind(workspace_user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Post groups created by an account since `since` (for monthly budgets)
pub async fn count_groups_created_since<'e, E>(
    executor: E,
    account_id: i64,
    since: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM post_groups WHERE account_id = $1 AND created_at >= $2",
    )
    .bind(account_id)
    .bind(since)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Claim due groups for publishing: `scheduled -> processing`, at most once
/// per group even with many workers racing.
pub async fn claim_due_groups(pool: &PgPool, limit: i64) -> Result<Vec<PostGroup>, sqlx::Error> {
    let query = format!(
        r#"
        WITH due AS (
            SELECT post_group_id
            FROM post_groups
            WHERE status = 'scheduled' AND scheduled_time <= NOW()
            ORDER BY scheduled_time ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE post_groups g
        SET status = 'processing',
            processing_started_at = NOW(),
            updated_at = NOW()
        FROM due
        WHERE g.post_group_id = due.post_group_id
        RETURNING {}
        "#,
        GROUP_COLUMNS
            .split(", ")
            .map(|c| format!("g.{}", c))
            .collect::<Vec<_>>()
            .join(", ")
    );

    sqlx::query_as(&query).bind(limit).fetch_all(pool).await
}

/// Re-claim groups stuck in `processing` past the watchdog ceiling. The
/// lease timestamp is bumped so concurrent watchdog passes skip them.
pub async fn reclaim_stuck_groups(
    pool: &PgPool,
    ceiling_seconds: i64,
    limit: i64,
) -> Result<Vec<PostGroup>, sqlx::Error> {
    let query = format!(
        r#"
        WITH stuck AS (
            SELECT post_group_id
            FROM post_groups
            WHERE status = 'processing'
              AND processing_started_at IS NOT NULL
              AND processing_started_at < NOW() - ($1::text || ' seconds')::interval
            ORDER BY processing_started_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
        )
        UPDATE post_groups g
        SET processing_started_at = NOW(),
            updated_at = NOW()
        FROM stuck
        WHERE g.post_group_id = stuck.post_group_id
        RETURNING {}
        "#,
        GROUP_COLUMNS
            .split(", ")
            .map(|c| format!("g.{}", c))
            .collect::<Vec<_>>()
            .join(", ")
    );

    sqlx::query_as(&query)
        .bind(ceiling_seconds)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Flip a claimed group's pending posts to `processing`
pub async fn mark_group_posts_processing<'e, E>(
    executor: E,
    post_group_id: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE posts SET status = 'processing' WHERE post_group_id = $1 AND status = 'scheduled'")
        .bind(post_group_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn mark_post_published<'e, E>(
    executor: E,
    post_id: i64,
    posted_id: &str,
    published_url: &str,
    attempts: i32,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "UPDATE posts
         SET status = 'published', posted_id = $2, published_url = $3,
             error = NULL, publish_attempts = $4
         WHERE id = $1",
    )
    .bind(post_id)
    .bind(posted_id)
    .bind(published_url)
    .bind(attempts)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn mark_post_failed<'e, E>(
    executor: E,
    post_id: i64,
    error: &str,
    attempts: i32,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "UPDATE posts
         SET status = 'failed', error = $2, publish_attempts = $3
         WHERE id = $1",
    )
    .bind(post_id)
    .bind(error)
    .bind(attempts)
    .execute(executor)
    .await?;
    Ok(())
}

/// Mark every unresolved post in a group failed (watchdog path)
pub async fn fail_unresolved_posts<'e, E>(
    executor: E,
    post_group_id: &str,
    error: &str,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE posts SET status = 'failed', error = $2
         WHERE post_group_id = $1 AND status IN ('scheduled', 'processing')",
    )
    .bind(post_group_id)
    .bind(error)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Record the aggregated terminal status. Only a `processing` group can
/// finalize, so recomputing after a watchdog pass cannot flip a result.
pub async fn finalize_group<'e, E>(
    executor: E,
    post_group_id: &str,
    status: GroupStatus,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE post_groups
         SET status = $2, updated_at = NOW()
         WHERE post_group_id = $1 AND status = 'processing'",
    )
    .bind(post_group_id)
    .bind(status)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
