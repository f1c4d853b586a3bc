//! API key authentication
//!
//! Every endpoint authenticates with the `x-publora-key` header. The
//! optional `x-publora-user-id` header lets a workspace act as one of its
//! managed users; when present it must name a user belonging to the key's
//! account, and all reads/writes are scoped to that user.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use crate::AppState;
use crate::constants::API_KEY_PREFIX;
use crate::domain::{accounts, workspace};
use crate::services::error::{ApiError, LogErr};

/// Extractor that validates the API key and resolves the acting identity
pub struct ApiAuth {
    pub account: accounts::Account,
    pub workspace_user_id: Option<String>,
}

impl ApiAuth {
    /// Managed user id when the request is workspace-delegated
    pub fn acting_user(&self) -> Option<&str> {
        self.workspace_user_id.as_deref()
    }
}

impl FromRequestParts<Arc<AppState>> for ApiAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("x-publora-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::InvalidKey)?;

        if !key.starts_with(API_KEY_PREFIX) {
            return Err(ApiError::InvalidKey);
        }

        let account = accounts::get_account_by_api_key(&state.db, key)
            .await
            .log_500("API key lookup error")?
            .ok_or(ApiError::InvalidKey)?;

        if account.suspended || account.subscription_tier == "none" {
            return Err(ApiError::SubscriptionRequired);
        }

        let workspace_user_id = match parts
            .headers
            .get("x-publora-user-id")
            .and_then(|v| v.to_str().ok())
        {
            None => None,
            Some(user_id) => {
                let user = workspace::get_workspace_user(&state.db, account.id, user_id)
                    .await
                    .log_500("Workspace user lookup error")?
                    .ok_or(ApiError::UserNotFound)?;
                Some(user.id)
            }
        };

        Ok(ApiAuth {
            account,
            workspace_user_id,
        })
    }
}
