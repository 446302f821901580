//! Upserts aggregated contests into the store, keyed by external id.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::db::{Repository, UpsertOutcome};
use crate::models::UpstreamContest;

/// Counts from one reconciliation.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Items upserted successfully, unchanged ones included
    pub synced: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

pub struct Reconciler {
    repo: Arc<Repository>,
}

impl Reconciler {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Upsert every contest. A failing item is logged and skipped.
    pub async fn reconcile(&self, contests: Vec<UpstreamContest>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        if contests.is_empty() {
            info!("No contests fetched to sync");
            return report;
        }

        for contest in dedup_by_external_id(contests) {
            match self.repo.upsert_contest(&contest).await {
                Ok(outcome) => {
                    report.synced += 1;
                    match outcome {
                        UpsertOutcome::Inserted => report.inserted += 1,
                        UpsertOutcome::Updated => report.updated += 1,
                        UpsertOutcome::Unchanged => report.unchanged += 1,
                    }
                }
                Err(e) => {
                    error!("Error syncing contest {}: {}", contest.external_id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "Synced {} contests",
            report.synced
        );

        report
    }
}

/// Keep one record per external id; the last one reported wins, at the
/// position where the id was first seen.
fn dedup_by_external_id(contests: Vec<UpstreamContest>) -> Vec<UpstreamContest> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(contests.len());
    let mut unique: Vec<UpstreamContest> = Vec::with_capacity(contests.len());

    for contest in contests {
        match index.get(&contest.external_id) {
            Some(&position) => unique[position] = contest,
            None => {
                index.insert(contest.external_id.clone(), unique.len());
                unique.push(contest);
            }
        }
    }

    unique
}
