//! Scheduled publish worker using apalis
//!
//! Runs as a cron job that claims due post groups (`scheduled ->
//! processing`, at most once per group even across workers), fans each
//! group's posts out to the platform adapters concurrently, then aggregates
//! the per-post outcomes into the group's terminal status. A watchdog pass
//! in the same tick force-resolves groups stuck in `processing` past a
//! bounded ceiling so no group hangs forever after a crash.

use apalis::prelude::*;
use apalis_cron::{CronStream, Schedule};
use apalis_sql::postgres::PostgresStorage;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::domain::connections;
use crate::domain::media;
use crate::domain::posts::queries as post_queries;
use crate::domain::posts::{PostGroup, PostStatus, aggregate_status};
use crate::platforms::{
    MediaAttachment, PublishError, PublishRequest, PublishSuccess, Publisher,
};

const CLAIM_BATCH_SIZE: i64 = 32;
const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_CRON_SECONDS: u64 = 5;
const DEFAULT_PROCESSING_CEILING_SECS: i64 = 900;
const MAX_PUBLISH_ATTEMPTS: u32 = 4;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Job input - marker for batch processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishJob {
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
}

impl From<chrono::DateTime<chrono::Utc>> for PublishJob {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        PublishJob { scheduled_at: dt }
    }
}

/// Shared context for the publish worker
#[derive(Clone)]
pub struct PublishContext {
    pub pool: PgPool,
    pub publisher: Arc<dyn Publisher>,
}

/// Bounded exponential backoff for transient publish failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_PUBLISH_ATTEMPTS,
            base_delay: Duration::from_millis(BACKOFF_BASE_MS),
            max_delay: Duration::from_millis(BACKOFF_CAP_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): exponential, capped,
    /// with up to 25% jitter so simultaneous retries spread out.
    fn delay_after(&self, attempt: u32) -> Duration {
        let exp = (self.base_delay.as_millis() as u64)
            .saturating_mul(1u64 << (attempt - 1).min(16));
        let capped = exp.min(self.max_delay.as_millis() as u64);
        // ThreadRng is not Send, keep it out of await scopes
        let jitter = {
            use rand::Rng;
            rand::rng().random_range(0..=capped / 4)
        };
        Duration::from_millis(capped + jitter)
    }
}

/// Job handler - claims and publishes due groups, then runs the watchdog.
/// Always returns Ok; per-group failures are logged and resolved by the
/// watchdog rather than failing the whole tick.
async fn process_publish_job(_job: PublishJob, ctx: Data<PublishContext>) -> Result<(), Error> {
    if let Err(e) = run_publish_batch(&ctx).await {
        error!("publish batch error (will retry next tick): {}", e);
    }
    if let Err(e) = run_watchdog_batch(&ctx).await {
        error!("watchdog batch error (will retry next tick): {}", e);
    }
    Ok(())
}

/// Start the publish worker
pub async fn run_publish_worker(pool: PgPool, publisher: Arc<dyn Publisher>) {
    let ctx = PublishContext {
        pool: pool.clone(),
        publisher,
    };

    let cron_seconds = publish_cron_seconds();
    let schedule_expr = format!("*/{} * * * * *", cron_seconds);

    // Run apalis migrations
    PostgresStorage::setup(&pool)
        .await
        .expect("Failed to set up apalis storage");

    let storage: PostgresStorage<PublishJob> = PostgresStorage::new(pool.clone());
    let schedule = Schedule::from_str(&schedule_expr).expect("Invalid publish worker schedule");
    let cron = CronStream::new(schedule);
    let backend = cron.pipe_to_storage(storage);

    info!(
        "publish worker starting (every {}s, {} concurrency, {}s processing ceiling)",
        cron_seconds,
        publish_concurrency(),
        processing_ceiling_secs()
    );

    let worker = WorkerBuilder::new("publish-worker")
        .data(ctx)
        .backend(backend)
        .build_fn(process_publish_job);

    Monitor::new()
        .register(worker)
        .run()
        .await
        .expect("Publish worker monitor failed");
}

/// Claim due groups and publish them, up to the configured concurrency
async fn run_publish_batch(ctx: &PublishContext) -> Result<(), sqlx::Error> {
    let concurrency = publish_concurrency();
    let mut tasks = tokio::task::JoinSet::new();
    let mut claim_failed = false;

    loop {
        let needed = concurrency.saturating_sub(tasks.len());
        if needed > 0 && !claim_failed {
            let claim_limit = std::cmp::min(CLAIM_BATCH_SIZE, needed as i64);
            let groups = match post_queries::claim_due_groups(&ctx.pool, claim_limit).await {
                Ok(g) => g,
                Err(e) => {
                    error!("claim error: {}", e);
                    claim_failed = true;
                    Vec::new()
                }
            };

            for group in groups {
                let pool = ctx.pool.clone();
                let publisher = ctx.publisher.clone();
                tasks.spawn(async move {
                    let group_id = group.post_group_id.clone();
                    if let Err(e) = publish_group(&pool, publisher, group).await {
                        // Left in processing; the watchdog resolves it.
                        error!("failed to publish group {}: {}", group_id, e);
                    }
                });
            }
        }

        if tasks.is_empty() {
            break;
        }

        if let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("publish task panicked: {}", e);
            }
        }
    }

    Ok(())
}

/// Publish every post in a claimed group. Per-platform publishes run
/// concurrently and independently; the group finalizes only after all of
/// them have reached a terminal state.
async fn publish_group(
    pool: &PgPool,
    publisher: Arc<dyn Publisher>,
    group: PostGroup,
) -> Result<(), sqlx::Error> {
    post_queries::mark_group_posts_processing(pool, &group.post_group_id).await?;
    let posts = post_queries::list_posts(pool, &group.post_group_id).await?;
    let assets = media::list_uploaded_media(pool, &group.post_group_id).await?;

    let attachments: Vec<MediaAttachment> = assets
        .into_iter()
        .map(|a| MediaAttachment {
            file_url: a.file_url,
            content_type: a.content_type,
        })
        .collect();

    let policy = RetryPolicy::default();
    let mut tasks = tokio::task::JoinSet::new();

    for post in posts
        .into_iter()
        .filter(|p| p.status == PostStatus::Processing)
    {
        let connection =
            connections::get_connection_by_platform_id(pool, &post.platform_connection_id).await?;

        let Some(connection) = connection else {
            post_queries::mark_post_failed(pool, post.id, "platform connection no longer exists", 0)
                .await?;
            continue;
        };

        let request = PublishRequest {
            content: group.content.clone(),
            media: attachments.clone(),
        };
        let publisher = publisher.clone();

        tasks.spawn(async move {
            let (result, attempts) =
                publish_with_retry(publisher.as_ref(), &connection, &request, policy).await;
            (post.id, result, attempts)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((post_id, Ok(success), attempts)) => {
                post_queries::mark_post_published(
                    pool,
                    post_id,
                    &success.posted_id,
                    &success.published_url,
                    attempts as i32,
                )
                .await?;
            }
            Ok((post_id, Err(e), attempts)) => {
                warn!("post {} failed to publish: {}", post_id, e);
                post_queries::mark_post_failed(pool, post_id, &e.to_string(), attempts as i32)
                    .await?;
            }
            Err(e) => {
                // The post row stays processing; the watchdog fails it.
                error!("platform publish task panicked: {}", e);
            }
        }
    }

    finalize(pool, &group.post_group_id).await
}

/// Retry transient failures with bounded exponential backoff. Returns the
/// final result plus the number of attempts actually made.
pub async fn publish_with_retry(
    publisher: &dyn Publisher,
    connection: &crate::domain::connections::PlatformConnection,
    request: &PublishRequest,
    policy: RetryPolicy,
) -> (Result<PublishSuccess, PublishError>, u32) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match publisher.publish(connection, request).await {
            Ok(success) => return (Ok(success), attempt),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "transient publish failure on {} (attempt {}/{}), retrying in {:?}: {}",
                    connection.platform_id, attempt, policy.max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}

/// Aggregate post outcomes and record the group's terminal status once every
/// post is terminal
async fn finalize(pool: &PgPool, post_group_id: &str) -> Result<(), sqlx::Error> {
    let statuses: Vec<PostStatus> = post_queries::list_posts(pool, post_group_id)
        .await?
        .into_iter()
        .map(|p| p.status)
        .collect();

    let status = aggregate_status(&statuses);
    if status.is_terminal() && post_queries::finalize_group(pool, post_group_id, status).await? {
        info!("post group {} finalized as {}", post_group_id, status.as_str());
    }

    Ok(())
}

/// Force-resolve groups stuck in processing past the ceiling: unresolved
/// posts are failed, then the group aggregates like any other.
async fn run_watchdog_batch(ctx: &PublishContext) -> Result<(), sqlx::Error> {
    let stuck =
        post_queries::reclaim_stuck_groups(&ctx.pool, processing_ceiling_secs(), CLAIM_BATCH_SIZE)
            .await?;

    for group in stuck {
        let failed = post_queries::fail_unresolved_posts(
            &ctx.pool,
            &group.post_group_id,
            "publish timed out",
        )
        .await?;
        if failed > 0 {
            warn!(
                "watchdog failed {} unresolved post(s) in group {}",
                failed, group.post_group_id
            );
        }
        finalize(&ctx.pool, &group.post_group_id).await?;
    }

    Ok(())
}

fn publish_concurrency() -> usize {
    env::var("PUBLISH_CONCURRENCY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_CONCURRENCY)
}

fn publish_cron_seconds() -> u64 {
    env::var("PUBLISH_CRON_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0 && *v <= 59)
        .unwrap_or(DEFAULT_CRON_SECONDS)
}

fn processing_ceiling_secs() -> i64 {
    env::var("PROCESSING_CEILING_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_PROCESSING_CEILING_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connections::{Platform, PlatformConnection};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn test_connection() -> PlatformConnection {
        PlatformConnection {
            platform_id: "twitter-1".to_string(),
            platform: Platform::Twitter,
            username: "tester".to_string(),
            display_name: "Tester".to_string(),
            profile_image_url: None,
            access_token: "token".to_string(),
            access_token_expires_at: None,
        }
    }

    fn test_request() -> PublishRequest {
        PublishRequest {
            content: "Hello".to_string(),
            media: Vec::new(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    /// Scripted publisher: pops one outcome per call, counts calls
    struct FakePublisher {
        outcomes: Mutex<Vec<Result<PublishSuccess, PublishError>>>,
        calls: Mutex<u32>,
    }

    impl FakePublisher {
        fn new(outcomes: Vec<Result<PublishSuccess, PublishError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(
            &self,
            _connection: &PlatformConnection,
            _request: &PublishRequest,
        ) -> Result<PublishSuccess, PublishError> {
            *self.calls.lock().unwrap() += 1;
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Ok(PublishSuccess {
                    posted_id: "1".to_string(),
                    published_url: "https://example.com/1".to_string(),
                })
            } else {
                outcomes.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_up_to_the_bound() {
        let publisher = FakePublisher::new(vec![
            Err(PublishError::RateLimited("slow down".to_string())),
            Err(PublishError::Timeout),
            Err(PublishError::Unavailable("502".to_string())),
            Err(PublishError::Unavailable("502".to_string())),
        ]);

        let (result, attempts) =
            publish_with_retry(&publisher, &test_connection(), &test_request(), fast_policy())
                .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
        assert_eq!(publisher.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_failures_do_not_retry() {
        let publisher = FakePublisher::new(vec![Err(PublishError::TokenExpired)]);

        let (result, attempts) =
            publish_with_retry(&publisher, &test_connection(), &test_request(), fast_policy())
                .await;

        assert!(matches!(result, Err(PublishError::TokenExpired)));
        assert_eq!(attempts, 1);
        assert_eq!(publisher.calls(), 1);
    }

    #[tokio::test]
    async fn transient_failure_then_success_recovers() {
        let publisher = FakePublisher::new(vec![
            Err(PublishError::RateLimited("slow down".to_string())),
            Ok(PublishSuccess {
                posted_id: "99".to_string(),
                published_url: "https://example.com/99".to_string(),
            }),
        ]);

        let (result, attempts) =
            publish_with_retry(&publisher, &test_connection(), &test_request(), fast_policy())
                .await;

        assert_eq!(result.unwrap().posted_id, "99");
        assert_eq!(attempts, 2);
    }

    #[test]
    fn backoff_grows_and_respects_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };

        // Jitter adds at most 25% on top of the capped exponential delay.
        let first = policy.delay_after(1);
        assert!(first >= Duration::from_millis(100));
        assert!(first <= Duration::from_millis(125));

        let third = policy.delay_after(3);
        assert!(third >= Duration::from_millis(400));
        assert!(third <= Duration::from_millis(500));

        let tenth = policy.delay_after(10);
        assert!(tenth <= Duration::from_millis(500));
    }
}
