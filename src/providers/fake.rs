//! In-memory provider for exercising the sync pipeline without network access.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Provider;
use crate::errors::AppError;
use crate::fetcher::{with_retry, RetryPolicy};
use crate::models::{Platform, UpstreamContest};

enum Behavior {
    Succeed(Vec<UpstreamContest>),
    Fail(String),
}

pub struct FakeProvider {
    name: String,
    platform: Platform,
    policy: RetryPolicy,
    behavior: Mutex<Behavior>,
    attempts: AtomicU32,
}

impl FakeProvider {
    /// A provider returning `contests` on every call.
    pub fn returning(name: &str, platform: Platform, contests: Vec<UpstreamContest>) -> Arc<Self> {
        Arc::new(Self::build(name, platform, 1, Behavior::Succeed(contests)))
    }

    /// A provider whose every attempt fails, retried `attempts` times.
    pub fn failing(name: &str, platform: Platform, attempts: u32, message: &str) -> Arc<Self> {
        Arc::new(Self::build(
            name,
            platform,
            attempts,
            Behavior::Fail(message.to_string()),
        ))
    }

    fn build(name: &str, platform: Platform, attempts: u32, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            platform,
            policy: RetryPolicy::new(attempts, Duration::ZERO),
            behavior: Mutex::new(behavior),
            attempts: AtomicU32::new(0),
        }
    }

    /// Replace the canned answer, e.g. to rename a contest between two syncs.
    pub fn set_contests(&self, contests: Vec<UpstreamContest>) {
        *self.behavior.lock().unwrap() = Behavior::Succeed(contests);
    }

    pub fn set_failing(&self, message: &str) {
        *self.behavior.lock().unwrap() = Behavior::Fail(message.to_string());
    }

    /// Number of simulated requests issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_contests(&self) -> Result<Vec<UpstreamContest>, AppError> {
        with_retry(&self.policy, &self.name, || async {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let outcome = match &*self.behavior.lock().unwrap() {
                Behavior::Succeed(contests) => Ok(contests.clone()),
                Behavior::Fail(message) => Err(AppError::Http(message.clone())),
            };
            outcome
        })
        .await
    }
}

/// Build a normalized contest for tests.
pub fn contest(
    external_id: &str,
    name: &str,
    platform: Platform,
    start_time: DateTime<Utc>,
    duration_seconds: Option<i64>,
) -> UpstreamContest {
    UpstreamContest {
        external_id: external_id.to_string(),
        name: name.to_string(),
        platform,
        start_time,
        duration_seconds,
        link: format!("https://example.com/contest/{}", external_id),
    }
}
