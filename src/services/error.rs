//! API error type shared by all route handlers.
//!
//! Every variant carries a stable, machine-checkable reason string so that
//! clients can branch on `error` without parsing the human-readable message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("content is required and must be a non-empty string")]
    ContentRequired,
    #[error("platforms is required and must be a non-empty array of platform connection ids")]
    PlatformsRequired,
    #[error(
        "'{0}' is no longer supported; create the post first, then request an upload target via /get-upload-url"
    )]
    DeprecatedMediaField(&'static str),
    #[error("scheduledTime must be a valid RFC 3339 timestamp strictly in the future")]
    InvalidScheduledTime,
    #[error("queryTypes must be \"ALL\" or a non-empty list of metric names")]
    InvalidQueryType,
    #[error("invalid or missing API key")]
    InvalidKey,
    #[error("an active subscription is required for this operation")]
    SubscriptionRequired,
    #[error("monthly post limit reached for this subscription tier")]
    LimitReached,
    #[error("post group not found")]
    PostNotFound,
    #[error("platform connection not found: {0}")]
    ConnectionNotFound(String),
    #[error("workspace user not found")]
    UserNotFound,
    #[error("media asset not found")]
    MediaNotFound,
    #[error("operation not allowed while the post group is in its current status")]
    InvalidTransition,
    #[error("media limit exceeded for the platforms in this post group")]
    MediaLimitExceeded,
    #[error("contentType must be an image/* or video/* type")]
    UnsupportedMediaType,
    #[error("upload URL signature is invalid")]
    InvalidUploadSignature,
    #[error("upload URL has expired")]
    UploadExpired,
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    /// Stable reason string exposed in the `error` field of the response body.
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::ContentRequired => "ContentRequired",
            ApiError::PlatformsRequired => "PlatformsRequired",
            ApiError::DeprecatedMediaField(_) => "DeprecatedMediaField",
            ApiError::InvalidScheduledTime => "InvalidScheduledTime",
            ApiError::InvalidQueryType => "InvalidQueryType",
            ApiError::InvalidKey => "InvalidKey",
            ApiError::SubscriptionRequired => "SubscriptionRequired",
            ApiError::LimitReached => "LimitReached",
            ApiError::PostNotFound => "PostNotFound",
            ApiError::ConnectionNotFound(_) => "ConnectionNotFound",
            ApiError::UserNotFound => "UserNotFound",
            ApiError::MediaNotFound => "MediaNotFound",
            ApiError::InvalidTransition => "InvalidTransition",
            ApiError::MediaLimitExceeded => "MediaLimitExceeded",
            ApiError::UnsupportedMediaType => "UnsupportedMediaType",
            ApiError::InvalidUploadSignature => "InvalidUploadSignature",
            ApiError::UploadExpired => "UploadExpired",
            ApiError::Internal => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ContentRequired
            | ApiError::PlatformsRequired
            | ApiError::DeprecatedMediaField(_)
            | ApiError::InvalidScheduledTime
            | ApiError::InvalidQueryType
            | ApiError::MediaLimitExceeded => StatusCode::BAD_REQUEST,
            ApiError::InvalidKey | ApiError::InvalidUploadSignature | ApiError::UploadExpired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::SubscriptionRequired | ApiError::LimitReached => StatusCode::FORBIDDEN,
            ApiError::PostNotFound
            | ApiError::ConnectionNotFound(_)
            | ApiError::UserNotFound
            | ApiError::MediaNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidTransition => StatusCode::CONFLICT,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.reason(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Extension trait for logging internal errors and converting to ApiError
pub trait LogErr<T> {
    /// Log error with context and return `ApiError::Internal`
    fn log_500(self, context: &str) -> Result<T, ApiError>;

    /// Log error with context and return a specific ApiError
    fn log_err(self, context: &str, err: ApiError) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{}: {}", context, e);
            ApiError::Internal
        })
    }

    fn log_err(self, context: &str, err: ApiError) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{}: {}", context, e);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_400_with_stable_reasons() {
        assert_eq!(ApiError::ContentRequired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ContentRequired.reason(), "ContentRequired");
        assert_eq!(ApiError::PlatformsRequired.reason(), "PlatformsRequired");
        assert_eq!(
            ApiError::InvalidScheduledTime.reason(),
            "InvalidScheduledTime"
        );
    }

    #[test]
    fn transition_conflicts_are_409() {
        assert_eq!(ApiError::InvalidTransition.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(ApiError::InvalidKey.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::LimitReached.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::SubscriptionRequired.status(),
            StatusCode::FORBIDDEN
        );
    }
}
