//! Health endpoint: database state, last sync and upstream name resolution.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Url;
use serde::Serialize;

use crate::config::ProviderUrls;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
    pub contests: Option<i64>,
    pub last_sync: Option<DateTime<Utc>>,
    /// Name resolution per upstream provider
    pub dns: BTreeMap<&'static str, DnsCheck>,
}

/// Outcome of resolving one upstream host.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DnsCheck {
    pub status: &'static str,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DnsCheck {
    fn ok(host: String) -> Self {
        Self {
            status: "ok",
            host,
            message: None,
        }
    }

    fn error(host: String, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            host,
            message: Some(message.into()),
        }
    }
}

/// GET /api/health - Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let contests = match state.repo.count_contests().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Health check database query failed: {}", e);
            None
        }
    };
    let database = if contests.is_some() {
        "connected"
    } else {
        "disconnected"
    };

    let dns = check_upstreams(&state.config.providers, state.config.http_timeout).await;

    Json(HealthResponse {
        status: if database == "connected" { "OK" } else { "DEGRADED" },
        timestamp: Utc::now(),
        database,
        contests,
        last_sync: state.scheduler.last_sync().await,
        dns,
    })
}

/// Resolve every provider host concurrently.
pub async fn check_upstreams(
    urls: &ProviderUrls,
    timeout: Duration,
) -> BTreeMap<&'static str, DnsCheck> {
    let targets = [
        ("codeforces", urls.codeforces.as_str()),
        ("kontests", urls.kontests.as_str()),
        ("leetcode", urls.leetcode.as_str()),
        ("codechef", urls.codechef.as_str()),
    ];

    let checks = join_all(
        targets
            .iter()
            .map(|(_, url)| resolve_host(url, timeout)),
    )
    .await;

    targets
        .iter()
        .map(|(name, _)| *name)
        .zip(checks)
        .collect()
}

async fn resolve_host(url: &str, timeout: Duration) -> DnsCheck {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => return DnsCheck::error(url.to_string(), format!("invalid URL: {}", e)),
    };
    let Some(host) = parsed.host_str().map(|h| h.trim_matches(['[', ']']).to_string()) else {
        return DnsCheck::error(url.to_string(), "URL has no host");
    };
    let port = parsed.port_or_known_default().unwrap_or(443);

    match tokio::time::timeout(timeout, tokio::net::lookup_host((host.clone(), port))).await {
        Ok(Ok(mut addrs)) => {
            if addrs.next().is_some() {
                DnsCheck::ok(host)
            } else {
                DnsCheck::error(host, "no addresses")
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(host = %host, error = %e, "Upstream host did not resolve");
            DnsCheck::error(host, e.to_string())
        }
        Err(_) => DnsCheck::error(host, "lookup timed out"),
    }
}
