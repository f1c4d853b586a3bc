//! Request validation for post create/update payloads.
//!
//! Pure functions of (payload, now): no IO, no mutation of the input. Every
//! rejection maps to one of the stable reason strings in
//! [`crate::services::error::ApiError`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;

use crate::domain::connections::{self, Platform};
use crate::domain::posts::GroupStatus;
use crate::services::error::ApiError;

/// Body of `POST /create-post`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub scheduled_time: Option<String>,
    // Historical upload-flow fields. Recognized so we can reject them with a
    // pointer at the corrected contract instead of silently ignoring them.
    pub media_urls: Option<serde_json::Value>,
    pub media_keys: Option<serde_json::Value>,
}

/// Body of `PUT /update-post/:postGroupId`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub scheduled_time: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCreate {
    pub content: String,
    /// (platform, full connection reference), in request order
    pub platforms: Vec<(Platform, String)>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpdate {
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: Option<GroupStatus>,
}

pub fn validate_create(
    req: &CreatePostRequest,
    now: DateTime<Utc>,
) -> Result<ValidatedCreate, ApiError> {
    if req.media_urls.is_some() {
        return Err(ApiError::DeprecatedMediaField("mediaUrls"));
    }
    if req.media_keys.is_some() {
        return Err(ApiError::DeprecatedMediaField("mediaKeys"));
    }

    let content = req.content.as_deref().map(str::trim).unwrap_or("");
    if content.is_empty() {
        return Err(ApiError::ContentRequired);
    }

    let refs = req.platforms.as_deref().unwrap_or(&[]);
    if refs.is_empty() {
        return Err(ApiError::PlatformsRequired);
    }

    let mut platforms = Vec::with_capacity(refs.len());
    let mut seen = HashSet::new();
    for reference in refs {
        let (platform, _) =
            connections::split_platform_id(reference).ok_or(ApiError::PlatformsRequired)?;
        if !seen.insert(reference.as_str()) {
            return Err(ApiError::PlatformsRequired);
        }
        platforms.push((platform, reference.clone()));
    }

    let scheduled_time = parse_scheduled_time(req.scheduled_time.as_deref(), now)?;
    // No scheduledTime means the group is parked as a draft until the caller
    // schedules it via update-post.
    let status = if scheduled_time.is_some() {
        GroupStatus::Scheduled
    } else {
        GroupStatus::Draft
    };

    Ok(ValidatedCreate {
        content: content.to_string(),
        platforms,
        scheduled_time,
        status,
    })
}

pub fn validate_update(
    req: &UpdatePostRequest,
    now: DateTime<Utc>,
) -> Result<ValidatedUpdate, ApiError> {
    let scheduled_time = parse_scheduled_time(req.scheduled_time.as_deref(), now)?;

    let status = match req.status.as_deref() {
        None => None,
        Some("draft") => Some(GroupStatus::Draft),
        Some("scheduled") => Some(GroupStatus::Scheduled),
        // Clients may only move a group between draft and scheduled; every
        // other status belongs to the publish pipeline.
        Some(_) => return Err(ApiError::InvalidTransition),
    };

    Ok(ValidatedUpdate {
        scheduled_time,
        status,
    })
}

fn parse_scheduled_time(
    raw: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let instant = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| ApiError::InvalidScheduledTime)?
        .with_timezone(&Utc);

    if instant <= now {
        return Err(ApiError::InvalidScheduledTime);
    }

    Ok(Some(instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    fn base_request() -> CreatePostRequest {
        CreatePostRequest {
            content: Some("Hello".to_string()),
            platforms: Some(vec!["twitter-1".to_string(), "linkedin-2".to_string()]),
            scheduled_time: Some("2026-03-01T14:00:00Z".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        let validated = validate_create(&base_request(), now()).unwrap();
        assert_eq!(validated.content, "Hello");
        assert_eq!(validated.platforms.len(), 2);
        assert_eq!(validated.platforms[0].0, Platform::Twitter);
        assert_eq!(validated.status, GroupStatus::Scheduled);
    }

    #[test]
    fn missing_or_blank_content_is_rejected() {
        let mut req = base_request();
        req.content = None;
        assert_eq!(validate_create(&req, now()), Err(ApiError::ContentRequired));

        req.content = Some("   ".to_string());
        assert_eq!(validate_create(&req, now()), Err(ApiError::ContentRequired));
    }

    #[test]
    fn missing_or_empty_platforms_are_rejected() {
        let mut req = base_request();
        req.platforms = None;
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::PlatformsRequired)
        );

        req.platforms = Some(vec![]);
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::PlatformsRequired)
        );
    }

    #[test]
    fn malformed_and_duplicate_platform_refs_are_rejected() {
        let mut req = base_request();
        req.platforms = Some(vec!["myspace-1".to_string()]);
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::PlatformsRequired)
        );

        req.platforms = Some(vec!["twitter-1".to_string(), "twitter-1".to_string()]);
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::PlatformsRequired)
        );
    }

    #[test]
    fn past_scheduled_time_is_rejected() {
        let mut req = base_request();
        req.scheduled_time = Some("2025-01-01T00:00:00Z".to_string());
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::InvalidScheduledTime)
        );

        // The boundary itself counts as past: strictly-future only.
        req.scheduled_time = Some("2026-02-01T12:00:00Z".to_string());
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::InvalidScheduledTime)
        );
    }

    #[test]
    fn unparseable_scheduled_time_is_rejected() {
        let mut req = base_request();
        req.scheduled_time = Some("next tuesday".to_string());
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::InvalidScheduledTime)
        );
    }

    #[test]
    fn absent_scheduled_time_creates_a_draft() {
        let mut req = base_request();
        req.scheduled_time = None;
        let validated = validate_create(&req, now()).unwrap();
        assert_eq!(validated.status, GroupStatus::Draft);
        assert_eq!(validated.scheduled_time, None);
    }

    #[test]
    fn deprecated_media_fields_are_rejected() {
        let mut req = base_request();
        req.media_urls = Some(serde_json::json!(["https://example.com/a.png"]));
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::DeprecatedMediaField("mediaUrls"))
        );

        let mut req = base_request();
        req.media_keys = Some(serde_json::json!(["key1"]));
        assert_eq!(
            validate_create(&req, now()),
            Err(ApiError::DeprecatedMediaField("mediaKeys"))
        );
    }

    #[test]
    fn update_accepts_draft_and_scheduled_only() {
        let req = UpdatePostRequest {
            scheduled_time: None,
            status: Some("scheduled".to_string()),
        };
        let validated = validate_update(&req, now()).unwrap();
        assert_eq!(validated.status, Some(GroupStatus::Scheduled));

        let req = UpdatePostRequest {
            scheduled_time: None,
            status: Some("published".to_string()),
        };
        assert_eq!(validate_update(&req, now()), Err(ApiError::InvalidTransition));
    }

    #[test]
    fn update_validates_scheduled_time_like_create() {
        let req = UpdatePostRequest {
            scheduled_time: Some("2025-01-01T00:00:00Z".to_string()),
            status: None,
        };
        assert_eq!(
            validate_update(&req, now()),
            Err(ApiError::InvalidScheduledTime)
        );
    }
}
