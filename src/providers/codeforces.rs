//! Codeforces contest list (`/api/contest.list`).

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{bounded_duration, expect_array, parse_records, Provider};
use crate::errors::AppError;
use crate::fetcher::{Fetcher, RequestSpec, RetryPolicy};
use crate::models::{Platform, UpstreamContest};

const SOURCE: &str = "Codeforces";

/// Phases worth storing. Running phases (`CODING`, `PENDING_SYSTEM_TEST`,
/// `SYSTEM_TEST`) are dropped; ongoing status is derived locally.
const ELIGIBLE_PHASES: [&str; 2] = ["BEFORE", "FINISHED"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContest {
    id: i64,
    name: String,
    phase: String,
    start_time_seconds: Option<i64>,
    duration_seconds: Option<i64>,
}

pub struct CodeforcesProvider {
    fetcher: Fetcher,
    base_url: String,
    policy: RetryPolicy,
}

impl CodeforcesProvider {
    pub fn new(fetcher: Fetcher, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }
}

#[async_trait]
impl Provider for CodeforcesProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    async fn fetch_contests(&self) -> Result<Vec<UpstreamContest>, AppError> {
        let request = RequestSpec::get(format!("{}/api/contest.list", self.base_url));
        let contests = self
            .fetcher
            .fetch_parsed(&request, &self.policy, normalize)
            .await?;
        info!("Fetched {} Codeforces contests", contests.len());
        Ok(contests)
    }
}

fn normalize(body: &Value) -> Result<Vec<UpstreamContest>, AppError> {
    let status = body.get("status").and_then(Value::as_str);
    if status != Some("OK") {
        let comment = body
            .get("comment")
            .and_then(Value::as_str)
            .unwrap_or("no comment");
        return Err(AppError::Payload(format!(
            "{}: status {:?} ({})",
            SOURCE, status, comment
        )));
    }

    let records: Vec<RawContest> = parse_records(SOURCE, expect_array(SOURCE, body, "result")?);

    Ok(records
        .into_iter()
        .filter(|c| ELIGIBLE_PHASES.contains(&c.phase.as_str()))
        .filter_map(|c| {
            let Some(start_time) = c
                .start_time_seconds
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
            else {
                warn!(source = SOURCE, id = c.id, "Skipping contest without start time");
                return None;
            };

            let external_id = Platform::Codeforces.external_id(&c.id.to_string());
            let duration_seconds = bounded_duration(SOURCE, &external_id, c.duration_seconds);

            Some(UpstreamContest {
                external_id,
                name: c.name,
                platform: Platform::Codeforces,
                start_time,
                duration_seconds,
                link: format!("https://codeforces.com/contest/{}", c.id),
            })
        })
        .collect())
}
