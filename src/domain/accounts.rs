//! Account domain - API-key owners and their subscription limits

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    #[allow(dead_code)] // Fetched from DB but intentionally not exposed in API responses
    pub name: String,
    pub subscription_tier: String,
    pub suspended: bool,
    pub monthly_post_limit: i32,
    pub created_at: DateTime<Utc>,
}

/// Look up the account owning an API key
pub async fn get_account_by_api_key<'e, E>(
    executor: E,
    api_key: &str,
) -> Result<Option<Account>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        "SELECT id, name, subscription_tier, suspended, monthly_post_limit, created_at
         FROM accounts WHERE api_key = $1",
    )
    .bind(api_key)
    .fetch_optional(executor)
    .await
}
