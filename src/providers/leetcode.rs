//! LeetCode GraphQL contest list.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{bounded_duration, parse_records, Provider};
use crate::errors::AppError;
use crate::fetcher::{Fetcher, RequestSpec, RetryPolicy};
use crate::models::{Platform, UpstreamContest};

const SOURCE: &str = "Leetcode (direct)";

const CONTEST_LIST_QUERY: &str = r#"
query getContestList {
  contestList {
    title
    titleSlug
    startTime
    duration
    originStartTime
  }
}
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContest {
    title: String,
    title_slug: String,
    start_time: i64,
    #[serde(default)]
    duration: Option<i64>,
}

pub struct LeetCodeProvider {
    fetcher: Fetcher,
    base_url: String,
    policy: RetryPolicy,
}

impl LeetCodeProvider {
    pub fn new(fetcher: Fetcher, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }
}

#[async_trait]
impl Provider for LeetCodeProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    fn platform(&self) -> Platform {
        Platform::Leetcode
    }

    async fn fetch_contests(&self) -> Result<Vec<UpstreamContest>, AppError> {
        let request = RequestSpec::post_json(
            format!("{}/graphql", self.base_url),
            json!({ "query": CONTEST_LIST_QUERY }),
        );
        let base_url = self.base_url.as_str();
        let contests = self
            .fetcher
            .fetch_parsed(&request, &self.policy, |body| normalize(base_url, body))
            .await?;
        info!("Fetched {} LeetCode contests directly", contests.len());
        Ok(contests)
    }
}

fn normalize(base_url: &str, body: &Value) -> Result<Vec<UpstreamContest>, AppError> {
    let items = body
        .pointer("/data/contestList")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let reason = body
                .pointer("/errors/0/message")
                .and_then(Value::as_str)
                .unwrap_or("missing data.contestList");
            AppError::Payload(format!("{}: {}", SOURCE, reason))
        })?;

    let records: Vec<RawContest> = parse_records(SOURCE, items);

    Ok(records
        .into_iter()
        .filter_map(|c| {
            let Some(start_time) = DateTime::from_timestamp(c.start_time, 0) else {
                warn!(source = SOURCE, slug = %c.title_slug, "Skipping contest with invalid start");
                return None;
            };

            let external_id = Platform::Leetcode.external_id(&c.title_slug);
            let duration_seconds = bounded_duration(SOURCE, &external_id, c.duration);

            Some(UpstreamContest {
                external_id,
                name: c.title,
                platform: Platform::Leetcode,
                start_time,
                duration_seconds,
                link: format!("{}/contest/{}", base_url, c.title_slug),
            })
        })
        .collect())
}
