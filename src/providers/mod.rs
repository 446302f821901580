//! Upstream contest providers.
//!
//! Each provider calls one external API and normalizes its answer into
//! [`UpstreamContest`]s. Providers are grouped per platform into ordered
//! [`ProviderChain`]s: the first entry is the primary source, later entries
//! are fallbacks tried only when everything before them failed.

mod codechef;
mod codeforces;
mod kontests;
mod leetcode;

#[cfg(test)]
pub mod fake;

pub use codechef::CodeChefProvider;
pub use codeforces::CodeforcesProvider;
pub use kontests::KontestsProvider;
pub use leetcode::LeetCodeProvider;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::errors::AppError;
use crate::fetcher::{Fetcher, RetryPolicy};
use crate::models::{Platform, UpstreamContest};

/// A source of contests for one platform.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human readable source name, used in logs and sync diagnostics.
    fn name(&self) -> &str;

    fn platform(&self) -> Platform;

    /// Fetch and normalize the provider's contests.
    ///
    /// Fails only when the request is exhausted or the answer is structurally
    /// wrong; single malformed records are skipped.
    async fn fetch_contests(&self) -> Result<Vec<UpstreamContest>, AppError>;
}

/// Providers for one platform, tried in order until one succeeds.
#[derive(Clone)]
pub struct ProviderChain {
    pub platform: Platform,
    pub providers: Vec<Arc<dyn Provider>>,
}

impl ProviderChain {
    pub fn new(platform: Platform, providers: Vec<Arc<dyn Provider>>) -> Self {
        debug_assert!(providers.iter().all(|p| p.platform() == platform));
        Self {
            platform,
            providers,
        }
    }
}

/// The production provider chains.
pub fn default_chains(config: &Config, fetcher: &Fetcher) -> Vec<ProviderChain> {
    let primary = RetryPolicy::primary(config);
    let fallback = RetryPolicy::fallback(config);
    let urls = &config.providers;

    let codeforces: Arc<dyn Provider> = Arc::new(CodeforcesProvider::new(
        fetcher.clone(),
        &urls.codeforces,
        primary,
    ));
    let codechef_kontests: Arc<dyn Provider> = Arc::new(KontestsProvider::new(
        fetcher.clone(),
        &urls.kontests,
        Platform::CodeChef,
        primary,
    ));
    let codechef_direct: Arc<dyn Provider> = Arc::new(CodeChefProvider::new(
        fetcher.clone(),
        &urls.codechef,
        fallback,
    ));
    let leetcode_kontests: Arc<dyn Provider> = Arc::new(KontestsProvider::new(
        fetcher.clone(),
        &urls.kontests,
        Platform::Leetcode,
        primary,
    ));
    let leetcode_direct: Arc<dyn Provider> = Arc::new(LeetCodeProvider::new(
        fetcher.clone(),
        &urls.leetcode,
        fallback,
    ));

    vec![
        ProviderChain::new(Platform::Codeforces, vec![codeforces]),
        ProviderChain::new(Platform::CodeChef, vec![codechef_kontests, codechef_direct]),
        ProviderChain::new(Platform::Leetcode, vec![leetcode_kontests, leetcode_direct]),
    ]
}

/// Deserialize every record of an upstream array, skipping the malformed ones.
pub(crate) fn parse_records<R: DeserializeOwned>(source: &str, items: &[Value]) -> Vec<R> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<R>(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(source, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect()
}

/// Pull the array at `key` out of an upstream container.
pub(crate) fn expect_array<'a>(
    source: &str,
    value: &'a Value,
    key: &str,
) -> Result<&'a [Value], AppError> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| AppError::Payload(format!("{}: response has no `{}` array", source, key)))
}

/// Last non-empty path segment of a URL, ignoring query and fragment.
pub(crate) fn trailing_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
}

/// Parse an upstream timestamp: RFC 3339, or `YYYY-MM-DD HH:MM:SS` in UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = raw.trim_end_matches(" UTC").trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.and_utc())
}

/// Interpret a duration given as a number or a numeric string.
///
/// Returns `None` for absent, negative or unparsable values.
pub(crate) fn parse_seconds(value: Option<&Value>) -> Option<i64> {
    let seconds = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }?;
    (seconds >= 0).then_some(seconds)
}

/// Longest duration accepted from upstream (a leap year).
pub(crate) const MAX_DURATION_SECS: i64 = 366 * 24 * 60 * 60;

/// Keep a duration only when it lies within `0..=MAX_DURATION_SECS`.
///
/// Out-of-range values are logged and stored as unknown.
pub(crate) fn bounded_duration(
    source: &str,
    external_id: &str,
    seconds: Option<i64>,
) -> Option<i64> {
    let seconds = seconds?;
    if (0..=MAX_DURATION_SECS).contains(&seconds) {
        Some(seconds)
    } else {
        warn!(source, id = external_id, seconds, "Dropping out-of-range duration");
        None
    }
}

/// Render an id that may arrive as a string or a number.
pub(crate) fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
