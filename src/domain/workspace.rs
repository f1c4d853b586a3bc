//! Workspace user domain - managed users acting under an account's key

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkspaceUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_workspace_user<'e, E>(
    executor: E,
    id: &str,
    account_id: i64,
    name: &str,
    email: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO workspace_users (id, account_id, name, email) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(account_id)
    .bind(name)
    .bind(email)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn list_workspace_users<'e, E>(
    executor: E,
    account_id: i64,
) -> Result<Vec<WorkspaceUser>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        "SELECT id, name, email, created_at FROM workspace_users
         WHERE account_id = $1 ORDER BY created_at ASC",
    )
    .bind(account_id)
    .fetch_all(executor)
    .await
}

pub async fn get_workspace_user<'e, E>(
    executor: E,
    account_id: i64,
    user_id: &str,
) -> Result<Option<WorkspaceUser>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        "SELECT id, name, email, created_at FROM workspace_users
         WHERE account_id = $1 AND id = $2",
    )
    .bind(account_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Delete a managed user. Returns false when no row matched.
pub async fn delete_workspace_user<'e, E>(
    executor: E,
    account_id: i64,
    user_id: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM workspace_users WHERE account_id = $1 AND id = $2")
        .bind(account_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
