//! kontests.net aggregated feeds (`/api/v1/<site>`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    bounded_duration, id_string, parse_records, parse_seconds, parse_timestamp, trailing_segment,
    Provider,
};
use crate::errors::AppError;
use crate::fetcher::{Fetcher, RequestSpec, RetryPolicy};
use crate::models::{Platform, UpstreamContest};

#[derive(Debug, Deserialize)]
struct RawContest {
    #[serde(default)]
    id: Option<Value>,
    name: String,
    url: String,
    start_time: String,
    #[serde(default)]
    duration: Option<Value>,
    #[serde(default)]
    status: Option<String>,
}

pub struct KontestsProvider {
    fetcher: Fetcher,
    base_url: String,
    platform: Platform,
    name: String,
    policy: RetryPolicy,
}

impl KontestsProvider {
    pub fn new(fetcher: Fetcher, base_url: &str, platform: Platform, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            platform,
            name: format!("{} (kontests.net)", platform),
            policy,
        }
    }

    fn site(&self) -> &'static str {
        match self.platform {
            Platform::Codeforces => "codeforces",
            Platform::CodeChef => "code_chef",
            Platform::Leetcode => "leet_code",
        }
    }
}

#[async_trait]
impl Provider for KontestsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_contests(&self) -> Result<Vec<UpstreamContest>, AppError> {
        let request = RequestSpec::get(format!("{}/api/v1/{}", self.base_url, self.site()));
        let platform = self.platform;
        let source = self.name.as_str();
        let contests = self
            .fetcher
            .fetch_parsed(&request, &self.policy, |body| normalize(source, platform, body))
            .await?;
        info!("Fetched {} {} contests from kontests.net", contests.len(), platform);
        Ok(contests)
    }
}

fn normalize(
    source: &str,
    platform: Platform,
    body: &Value,
) -> Result<Vec<UpstreamContest>, AppError> {
    let items = body
        .as_array()
        .ok_or_else(|| AppError::Payload(format!("{}: response is not an array", source)))?;

    let records: Vec<RawContest> = parse_records(source, items);

    Ok(records
        .into_iter()
        // "CODING" marks a running contest; ongoing status is derived locally.
        .filter(|c| c.status.as_deref() != Some("CODING"))
        .filter_map(|c| {
            let Some(local_id) =
                id_string(c.id.as_ref()).or_else(|| trailing_segment(&c.url).map(str::to_string))
            else {
                warn!(source, url = %c.url, "Skipping contest without id");
                return None;
            };
            let Some(start_time) = parse_timestamp(&c.start_time) else {
                warn!(source, start_time = %c.start_time, "Skipping contest with unreadable start");
                return None;
            };

            let external_id = platform.external_id(&local_id);
            let duration_seconds =
                bounded_duration(source, &external_id, parse_seconds(c.duration.as_ref()));

            Some(UpstreamContest {
                external_id,
                name: c.name,
                platform,
                start_time,
                duration_seconds,
                link: c.url,
            })
        })
        .collect())
}
