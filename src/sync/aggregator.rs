//! Runs every provider chain and gathers what they return.

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{Platform, UpstreamContest};
use crate::providers::ProviderChain;

/// A provider failure recorded during aggregation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceError {
    pub source: String,
    pub message: String,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Everything one aggregation produced.
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub contests: Vec<UpstreamContest>,
    pub errors: Vec<SourceError>,
    /// Chains where some provider answered
    pub chains_succeeded: usize,
    pub chains_total: usize,
}

impl AggregateReport {
    /// True when there were chains to run and none of them produced an answer.
    pub fn all_failed(&self) -> bool {
        self.chains_total > 0 && self.chains_succeeded == 0
    }
}

struct ChainOutcome {
    contests: Option<Vec<UpstreamContest>>,
    errors: Vec<SourceError>,
}

/// Invokes all provider chains concurrently.
pub struct Aggregator {
    chains: Vec<ProviderChain>,
}

impl Aggregator {
    pub fn new(chains: Vec<ProviderChain>) -> Self {
        Self { chains }
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.chains.iter().map(|c| c.platform).collect()
    }

    /// Run every chain. Never fails: provider errors are collected in the report.
    pub async fn run(&self) -> AggregateReport {
        let outcomes = join_all(self.chains.iter().map(run_chain)).await;

        let mut report = AggregateReport {
            chains_total: self.chains.len(),
            ..AggregateReport::default()
        };

        for outcome in outcomes {
            if let Some(contests) = outcome.contests {
                report.chains_succeeded += 1;
                report.contests.extend(contests);
            }
            report.errors.extend(outcome.errors);
        }

        info!("Total fetched contests: {}", report.contests.len());
        if !report.errors.is_empty() {
            warn!("Fetch errors encountered: {}", report.errors.len());
        }

        report
    }
}

/// Try the chain's providers in order until one answers.
async fn run_chain(chain: &ProviderChain) -> ChainOutcome {
    let mut errors = Vec::new();

    for (position, provider) in chain.providers.iter().enumerate() {
        if position > 0 {
            info!(
                platform = %chain.platform,
                "Falling back to {}",
                provider.name()
            );
        }

        match provider.fetch_contests().await {
            Ok(contests) => {
                info!(
                    source = provider.name(),
                    count = contests.len(),
                    "Provider returned contests"
                );
                return ChainOutcome {
                    contests: Some(contests),
                    errors,
                };
            }
            Err(e) => {
                warn!("Error fetching {} contests: {}", provider.name(), e.message());
                errors.push(SourceError {
                    source: provider.name().to_string(),
                    message: e.message(),
                });
            }
        }
    }

    if chain.providers.is_empty() {
        errors.push(SourceError {
            source: chain.platform.to_string(),
            message: "no provider configured".to_string(),
        });
    }

    ChainOutcome {
        contests: None,
        errors,
    }
}
