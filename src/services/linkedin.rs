//! LinkedIn analytics proxy: post/account statistics and reactions.
//!
//! Statistics live entirely outside the publishing pipeline; a failure here
//! is returned to the caller and never touches post group state.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::constants::PLATFORM_CALL_TIMEOUT_SECS;
use crate::services::error::ApiError;

const LINKEDIN_API_BASE: &str = "https://api.linkedin.com/rest";
const LINKEDIN_VERSION: &str = "202411";

/// Engagement metric kinds LinkedIn reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Impression,
    MembersReached,
    Reshare,
    Reaction,
    Comment,
}

impl MetricType {
    pub const ALL: [MetricType; 5] = [
        MetricType::Impression,
        MetricType::MembersReached,
        MetricType::Reshare,
        MetricType::Reaction,
        MetricType::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Impression => "IMPRESSION",
            MetricType::MembersReached => "MEMBERS_REACHED",
            MetricType::Reshare => "RESHARE",
            MetricType::Reaction => "REACTION",
            MetricType::Comment => "COMMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IMPRESSION" => Some(MetricType::Impression),
            "MEMBERS_REACHED" => Some(MetricType::MembersReached),
            "RESHARE" => Some(MetricType::Reshare),
            "REACTION" => Some(MetricType::Reaction),
            "COMMENT" => Some(MetricType::Comment),
            _ => None,
        }
    }
}

/// Wire shape of the `queryTypes` field: the literal `"ALL"` or an explicit
/// list of metric names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QueryTypes {
    One(String),
    Many(Vec<String>),
}

/// Expand `queryTypes` into the concrete metrics to fetch. Partial lists
/// yield only the requested keys in the response.
pub fn parse_query_types(raw: &QueryTypes) -> Result<Vec<MetricType>, ApiError> {
    match raw {
        QueryTypes::One(s) if s == "ALL" => Ok(MetricType::ALL.to_vec()),
        QueryTypes::One(s) => {
            let metric = MetricType::parse(s).ok_or(ApiError::InvalidQueryType)?;
            Ok(vec![metric])
        }
        QueryTypes::Many(names) => {
            if names.is_empty() {
                return Err(ApiError::InvalidQueryType);
            }
            names
                .iter()
                .map(|n| MetricType::parse(n).ok_or(ApiError::InvalidQueryType))
                .collect()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkedInError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LinkedIn API error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct AnalyticsResponse {
    elements: Vec<AnalyticsElement>,
}

#[derive(Debug, Deserialize)]
struct AnalyticsElement {
    value: i64,
}

#[derive(Clone)]
pub struct LinkedInClient {
    http: Client,
}

impl LinkedInClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(PLATFORM_CALL_TIMEOUT_SECS))
            .build()
            .expect("failed to build LinkedIn HTTP client");
        Self { http }
    }

    /// Fetch one metric for a member's post (`share_urn` set) or for the
    /// whole account (`share_urn` absent).
    async fn fetch_metric(
        &self,
        access_token: &str,
        member_id: &str,
        share_urn: Option<&str>,
        metric: MetricType,
    ) -> Result<i64, LinkedInError> {
        let mut url = format!(
            "{}/memberCreatorPostAnalytics?q=memberPostAnalytics&member=urn%3Ali%3Aperson%3A{}&queryType={}",
            LINKEDIN_API_BASE,
            percent_encode(member_id),
            metric.as_str()
        );
        if let Some(urn) = share_urn {
            url.push_str(&format!("&entity={}", percent_encode(urn)));
        }

        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("LinkedIn-Version", LINKEDIN_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(LinkedInError::Api(text));
        }

        let wrapper: AnalyticsResponse = resp.json().await?;
        // LinkedIn returns one element per time bucket; the lifetime query
        // used here yields a single element. Absent data counts as zero.
        Ok(wrapper.elements.first().map(|e| e.value).unwrap_or(0))
    }

    /// Metrics for a single published post, keyed by metric name
    pub async fn post_statistics(
        &self,
        access_token: &str,
        member_id: &str,
        posted_id: &str,
        metrics: &[MetricType],
    ) -> Result<HashMap<String, i64>, LinkedInError> {
        let share_urn = format!("urn:li:share:{}", posted_id);
        let mut out = HashMap::with_capacity(metrics.len());
        for metric in metrics {
            let value = self
                .fetch_metric(access_token, member_id, Some(&share_urn), *metric)
                .await?;
            out.insert(metric.as_str().to_string(), value);
        }
        Ok(out)
    }

    /// Metrics aggregated across the whole member account
    pub async fn account_statistics(
        &self,
        access_token: &str,
        member_id: &str,
        metrics: &[MetricType],
    ) -> Result<HashMap<String, i64>, LinkedInError> {
        let mut out = HashMap::with_capacity(metrics.len());
        for metric in metrics {
            let value = self
                .fetch_metric(access_token, member_id, None, *metric)
                .await?;
            out.insert(metric.as_str().to_string(), value);
        }
        Ok(out)
    }

    /// React to a post as the connected member
    pub async fn create_reaction(
        &self,
        access_token: &str,
        member_id: &str,
        posted_id: &str,
        reaction_type: &str,
    ) -> Result<(), LinkedInError> {
        let url = format!(
            "{}/reactions?actor=urn%3Ali%3Aperson%3A{}",
            LINKEDIN_API_BASE,
            percent_encode(member_id)
        );

        let body = serde_json::json!({
            "root": format!("urn:li:share:{}", posted_id),
            "reactionType": reaction_type,
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("LinkedIn-Version", LINKEDIN_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(LinkedInError::Api(text));
        }

        Ok(())
    }

    /// Remove the member's reaction from a post
    pub async fn delete_reaction(
        &self,
        access_token: &str,
        member_id: &str,
        posted_id: &str,
    ) -> Result<(), LinkedInError> {
        let key = format!(
            "(actor:urn%3Ali%3Aperson%3A{},entity:urn%3Ali%3Ashare%3A{})",
            percent_encode(member_id),
            percent_encode(posted_id)
        );
        let url = format!("{}/reactions/{}", LINKEDIN_API_BASE, key);

        let resp = self
            .http
            .delete(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("LinkedIn-Version", LINKEDIN_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(LinkedInError::Api(text));
        }

        Ok(())
    }
}

impl Default for LinkedInClient {
    fn default() -> Self {
        Self::new()
    }
}

fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_expands_to_every_metric() {
        let metrics = parse_query_types(&QueryTypes::One("ALL".to_string())).unwrap();
        assert_eq!(metrics.len(), 5);
        assert_eq!(metrics, MetricType::ALL.to_vec());
    }

    #[test]
    fn partial_lists_keep_request_order() {
        let metrics = parse_query_types(&QueryTypes::Many(vec![
            "RESHARE".to_string(),
            "IMPRESSION".to_string(),
        ]))
        .unwrap();
        assert_eq!(metrics, vec![MetricType::Reshare, MetricType::Impression]);
    }

    #[test]
    fn unknown_metric_names_are_rejected() {
        assert!(parse_query_types(&QueryTypes::One("CLICKS".to_string())).is_err());
        assert!(
            parse_query_types(&QueryTypes::Many(vec![
                "IMPRESSION".to_string(),
                "CLICKS".to_string()
            ]))
            .is_err()
        );
        assert!(parse_query_types(&QueryTypes::Many(vec![])).is_err());
    }
}
