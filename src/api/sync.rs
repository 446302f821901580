//! Sync API endpoints.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{success, ApiResult};
use crate::sync::SyncReport;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSyncResponse {
    pub last_sync: Option<DateTime<Utc>>,
}

/// GET /api/last-sync - Time of the last successful sync.
pub async fn get_last_sync(State(state): State<AppState>) -> ApiResult<LastSyncResponse> {
    success(LastSyncResponse {
        last_sync: state.scheduler.last_sync().await,
    })
}

/// POST /api/force-sync - Run a sync cycle now.
///
/// Waits for a cycle already in progress before starting its own.
pub async fn force_sync(State(state): State<AppState>) -> ApiResult<SyncReport> {
    let report = state.scheduler.run_cycle().await?;
    success(report)
}
