//! Retrying HTTP fetcher used by every provider.
//!
//! Each request gets a fixed attempt budget with a constant pause between
//! attempts. Attempts are strictly sequential.

use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::AppError;

/// Attempt budget and pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Budget for primary providers.
    pub fn primary(config: &Config) -> Self {
        Self::new(config.retry_attempts, config.retry_delay)
    }

    /// Smaller budget for fallback providers, so a broken fallback fails fast.
    pub fn fallback(config: &Config) -> Self {
        Self::new(config.fallback_attempts, config.retry_delay)
    }
}

/// Run `operation` until it succeeds or the budget is spent.
///
/// On exhaustion the last error is returned wrapped in
/// [`AppError::RetryExhausted`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    target: &str,
    operation: F,
) -> Result<T, AppError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(request = target, attempt, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    request = target,
                    attempt,
                    attempts_left = max_attempts - attempt,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(request = target, attempt, error = %e, "Request failed, giving up");
                return Err(AppError::RetryExhausted {
                    target: target.to_string(),
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
        }
    }
}

/// Description of one upstream request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST carrying a JSON body.
    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// HTTP client issuing [`RequestSpec`]s with retry.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Fetch a JSON document and run `parse` on it, retrying per `policy`.
    ///
    /// Transport errors, non-2xx answers, bodies that are not JSON and bodies
    /// rejected by `parse` all count as a failed attempt.
    pub async fn fetch_parsed<T, P>(
        &self,
        request: &RequestSpec,
        policy: &RetryPolicy,
        parse: P,
    ) -> Result<T, AppError>
    where
        P: Fn(&Value) -> Result<T, AppError>,
    {
        with_retry(policy, &request.describe(), || async {
            let body = self.send_once(request).await?;
            parse(&body)
        })
        .await
    }

    async fn send_once(&self, request: &RequestSpec) -> Result<Value, AppError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?.error_for_status()?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
