//! Owns the sync cycle and the time of the last successful one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use super::aggregator::{Aggregator, SourceError};
use super::reconciler::{ReconcileReport, Reconciler};
use crate::errors::AppError;

/// Outcome of a completed sync cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub fetched: usize,
    pub synced_count: usize,
    pub reconcile: ReconcileReport,
    pub errors: Vec<SourceError>,
    pub completed_at: DateTime<Utc>,
}

/// Runs aggregate-then-reconcile cycles, one at a time.
pub struct SyncScheduler {
    aggregator: Aggregator,
    reconciler: Reconciler,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    /// Held for the whole cycle; a second trigger waits its turn.
    cycle: Mutex<()>,
}

impl SyncScheduler {
    pub fn new(aggregator: Aggregator, reconciler: Reconciler) -> Self {
        Self {
            aggregator,
            reconciler,
            last_sync: RwLock::new(None),
            cycle: Mutex::new(()),
        }
    }

    /// Completion time of the last successful cycle, if any.
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().await
    }

    /// Run one cycle.
    ///
    /// When every provider fails nothing is written, the last sync time is
    /// kept, and [`AppError::SyncFailed`] carries the collected errors.
    pub async fn run_cycle(&self) -> Result<SyncReport, AppError> {
        let _cycle = self.cycle.lock().await;
        info!("Starting contest sync");

        let aggregate = self.aggregator.run().await;

        if aggregate.all_failed() {
            warn!(
                errors = aggregate.errors.len(),
                "Every provider failed, keeping stored contests"
            );
            return Err(AppError::SyncFailed {
                message: "No provider returned contests; stored data left untouched".to_string(),
                errors: aggregate.errors.iter().map(ToString::to_string).collect(),
            });
        }

        let fetched = aggregate.contests.len();
        let reconcile = self.reconciler.reconcile(aggregate.contests).await;
        let completed_at = Utc::now();
        *self.last_sync.write().await = Some(completed_at);

        info!(
            fetched,
            synced = reconcile.synced,
            errors = aggregate.errors.len(),
            "Contest sync completed"
        );

        Ok(SyncReport {
            fetched,
            synced_count: reconcile.synced,
            reconcile,
            errors: aggregate.errors,
            completed_at,
        })
    }

    /// Run the startup cycle in the background; failures are only logged.
    pub fn spawn_startup_sync(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = scheduler.run_cycle().await {
                error!("Error syncing contests on startup: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, Repository};
    use crate::models::Platform;
    use crate::providers::fake::{contest, FakeProvider};
    use crate::providers::{Provider, ProviderChain};
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct Fixture {
        scheduler: Arc<SyncScheduler>,
        repo: Arc<Repository>,
        codeforces: Arc<FakeProvider>,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let start = Utc.with_ymd_and_hms(2024, 7, 1, 14, 35, 0).unwrap();
        let codeforces = FakeProvider::returning(
            "Codeforces",
            Platform::Codeforces,
            vec![contest("cf_1", "Div 2", Platform::Codeforces, start, Some(7200))],
        );
        let provider: Arc<dyn Provider> = codeforces.clone();
        let aggregator = Aggregator::new(vec![ProviderChain::new(
            Platform::Codeforces,
            vec![provider],
        )]);

        Fixture {
            scheduler: Arc::new(SyncScheduler::new(
                aggregator,
                Reconciler::new(repo.clone()),
            )),
            repo,
            codeforces,
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn test_last_sync_absent_until_first_cycle() {
        let fx = fixture().await;
        assert!(fx.scheduler.last_sync().await.is_none());

        let report = fx.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.synced_count, 1);
        assert_eq!(fx.scheduler.last_sync().await, Some(report.completed_at));
    }

    #[tokio::test]
    async fn test_manual_cycle_advances_last_sync() {
        let fx = fixture().await;
        let first = fx.scheduler.run_cycle().await.unwrap().completed_at;
        let second = fx.scheduler.run_cycle().await.unwrap().completed_at;

        assert!(second >= first);
        assert_eq!(fx.scheduler.last_sync().await, Some(second));
        assert_eq!(fx.repo.count_contests().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_keeps_data_and_last_sync() {
        let fx = fixture().await;
        let good = fx.scheduler.run_cycle().await.unwrap().completed_at;

        fx.codeforces.set_failing("connection refused");
        let err = fx.scheduler.run_cycle().await.unwrap_err();

        match err {
            AppError::SyncFailed { errors, .. } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("connection refused"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fx.scheduler.last_sync().await, Some(good));
        assert!(fx.repo.get_contest("cf_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_triggers_are_serialized() {
        let fx = fixture().await;

        let (a, b) = tokio::join!(fx.scheduler.run_cycle(), fx.scheduler.run_cycle());
        let (a, b) = (a.unwrap(), b.unwrap());

        // Whichever ran second saw the record the first one inserted.
        assert_eq!(a.reconcile.inserted + b.reconcile.inserted, 1);
        assert_eq!(a.reconcile.unchanged + b.reconcile.unchanged, 1);
        assert_eq!(fx.repo.count_contests().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_startup_sync_runs_in_background() {
        let fx = fixture().await;
        fx.scheduler.spawn_startup_sync().await.unwrap();

        assert!(fx.scheduler.last_sync().await.is_some());
        assert_eq!(fx.codeforces.attempts(), 1);
    }
}
