//! CodeChef's own contest listing (`/api/list/contests/all`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    bounded_duration, expect_array, parse_records, parse_seconds, parse_timestamp, Provider,
};
use crate::errors::AppError;
use crate::fetcher::{Fetcher, RequestSpec, RetryPolicy};
use crate::models::{Platform, UpstreamContest};

const SOURCE: &str = "CodeChef (direct)";

/// Listings worth storing; `present_contests` are running and skipped.
const ELIGIBLE_LISTS: [&str; 2] = ["future_contests", "past_contests"];

#[derive(Debug, Deserialize)]
struct RawContest {
    contest_code: String,
    contest_name: String,
    contest_start_date_iso: String,
    /// Minutes, usually as a string
    #[serde(default)]
    contest_duration: Option<Value>,
}

pub struct CodeChefProvider {
    fetcher: Fetcher,
    base_url: String,
    policy: RetryPolicy,
}

impl CodeChefProvider {
    pub fn new(fetcher: Fetcher, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }
}

#[async_trait]
impl Provider for CodeChefProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    fn platform(&self) -> Platform {
        Platform::CodeChef
    }

    async fn fetch_contests(&self) -> Result<Vec<UpstreamContest>, AppError> {
        let request = RequestSpec::get(format!("{}/api/list/contests/all", self.base_url))
            .header("Accept", "application/json");
        let base_url = self.base_url.as_str();
        let contests = self
            .fetcher
            .fetch_parsed(&request, &self.policy, |body| normalize(base_url, body))
            .await?;
        info!("Fetched {} CodeChef contests directly", contests.len());
        Ok(contests)
    }
}

fn normalize(base_url: &str, body: &Value) -> Result<Vec<UpstreamContest>, AppError> {
    if let Some(status) = body.get("status").and_then(Value::as_str) {
        if status != "success" {
            return Err(AppError::Payload(format!("{}: status {:?}", SOURCE, status)));
        }
    }

    let mut contests = Vec::new();
    for list in ELIGIBLE_LISTS {
        let records: Vec<RawContest> = parse_records(SOURCE, expect_array(SOURCE, body, list)?);

        for c in records {
            let Some(start_time) = parse_timestamp(&c.contest_start_date_iso) else {
                warn!(source = SOURCE, code = %c.contest_code, "Skipping contest with unreadable start");
                continue;
            };

            let external_id = Platform::CodeChef.external_id(&c.contest_code);
            // Minutes upstream
            let duration_seconds = parse_seconds(c.contest_duration.as_ref())
                .and_then(|minutes| minutes.checked_mul(60));

            contests.push(UpstreamContest {
                external_id: external_id.clone(),
                name: c.contest_name,
                platform: Platform::CodeChef,
                start_time,
                duration_seconds: bounded_duration(SOURCE, &external_id, duration_seconds),
                link: format!("{}/{}", base_url, c.contest_code),
            });
        }
    }

    Ok(contests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "status": "success",
            "message": "All contests list",
            "present_contests": [
                {"contest_code": "START129", "contest_name": "Starters 129",
                 "contest_start_date_iso": "2024-04-10T20:00:00+05:30", "contest_duration": "120"}
            ],
            "future_contests": [
                {"contest_code": "START130", "contest_name": "Starters 130",
                 "contest_start_date_iso": "2024-04-17T20:00:00+05:30", "contest_duration": "120"}
            ],
            "past_contests": [
                {"contest_code": "START128", "contest_name": "Starters 128",
                 "contest_start_date_iso": "2024-04-03T20:00:00+05:30", "contest_duration": 120},
                {"contest_code": "BROKEN", "contest_name": "Broken"}
            ]
        })
    }

    #[test]
    fn test_normalizes_future_and_past() {
        let contests = normalize("https://www.codechef.com", &sample()).unwrap();
        let ids: Vec<&str> = contests.iter().map(|c| c.external_id.as_str()).collect();
        assert_eq!(ids, vec!["cc_START130", "cc_START128"]);

        let next = &contests[0];
        assert_eq!(
            next.start_time,
            Utc.with_ymd_and_hms(2024, 4, 17, 14, 30, 0).unwrap()
        );
        assert_eq!(next.duration_seconds, Some(7200));
        assert_eq!(next.link, "https://www.codechef.com/START130");
    }

    #[test]
    fn test_huge_minute_count_is_dropped() {
        let body = json!({
            "status": "success",
            "future_contests": [
                {"contest_code": "LONG", "contest_name": "Endless",
                 "contest_start_date_iso": "2024-04-17T20:00:00+05:30",
                 "contest_duration": "999999999999999999"},
                {"contest_code": "YEAR", "contest_name": "Too long",
                 "contest_start_date_iso": "2024-04-17T20:00:00+05:30",
                 "contest_duration": 600000}
            ],
            "past_contests": []
        });

        let contests = normalize("https://www.codechef.com", &body).unwrap();
        assert_eq!(contests.len(), 2);
        assert!(contests.iter().all(|c| c.duration_seconds.is_none()));
    }

    #[test]
    fn test_missing_listing_is_structural_error() {
        let err = normalize("https://www.codechef.com", &json!({"status": "success"})).unwrap_err();
        assert!(matches!(err, AppError::Payload(_)));

        let err = normalize("https://www.codechef.com", &json!({"status": "error"})).unwrap_err();
        assert!(matches!(err, AppError::Payload(_)));
    }
}
