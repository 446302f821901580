//! Contest API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{ContestFilter, ContestStatus, ContestView, Platform, SolutionLinkRequest};
use crate::AppState;

/// Query parameters shared by the listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ContestListQuery {
    /// Comma separated platform names
    #[serde(default)]
    pub platforms: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Parse a comma separated platform list; blank means every platform.
pub fn parse_platforms(raw: Option<&str>) -> Result<Vec<Platform>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let mut platforms = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let platform = Platform::parse(name)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown platform: {}", name)))?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(platforms)
}

fn parse_status(raw: Option<&str>) -> Result<Option<ContestStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => ContestStatus::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {}", s))),
    }
}

/// Current instant at the precision the store keeps start times in.
fn request_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// List and label contests against the same whole-second instant.
async fn list_as_of(
    repo: &Repository,
    filter: &ContestFilter,
    now: DateTime<Utc>,
) -> Result<Vec<ContestView>, AppError> {
    let now = now.trunc_subsecs(0);
    let contests = repo.list_contests(filter, now).await?;
    Ok(contests.into_iter().map(|c| c.into_view(now)).collect())
}

async fn list_with_status(
    state: &AppState,
    platforms: Option<&str>,
    status: ContestStatus,
) -> ApiResult<Vec<ContestView>> {
    let filter = ContestFilter {
        platforms: parse_platforms(platforms)?,
        status: Some(status),
    };
    success(list_as_of(&state.repo, &filter, Utc::now()).await?)
}

/// GET /api/contests - List contests, upcoming ones unless a status is given.
pub async fn list_contests(
    State(state): State<AppState>,
    Query(params): Query<ContestListQuery>,
) -> ApiResult<Vec<ContestView>> {
    let status = parse_status(params.status.as_deref())?.unwrap_or(ContestStatus::Upcoming);
    list_with_status(&state, params.platforms.as_deref(), status).await
}

/// GET /api/ongoing-contests - List running contests.
pub async fn list_ongoing_contests(
    State(state): State<AppState>,
    Query(params): Query<ContestListQuery>,
) -> ApiResult<Vec<ContestView>> {
    list_with_status(&state, params.platforms.as_deref(), ContestStatus::Ongoing).await
}

/// GET /api/past-contests - List finished contests, newest first.
pub async fn list_past_contests(
    State(state): State<AppState>,
    Query(params): Query<ContestListQuery>,
) -> ApiResult<Vec<ContestView>> {
    list_with_status(&state, params.platforms.as_deref(), ContestStatus::Past).await
}

/// GET /api/contests/:id - Get a single contest.
pub async fn get_contest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ContestView> {
    match state.repo.get_contest(&id).await? {
        Some(contest) => success(contest.into_view(request_now())),
        None => Err(AppError::NotFound(format!("Contest {} not found", id))),
    }
}

/// POST /api/contests/:id/bookmark - Bookmark a contest.
pub async fn bookmark_contest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ContestView> {
    let contest = state.repo.set_bookmarked(&id, true).await?;
    success(contest.into_view(request_now()))
}

/// POST /api/contests/:id/unbookmark - Remove a bookmark.
pub async fn unbookmark_contest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ContestView> {
    let contest = state.repo.set_bookmarked(&id, false).await?;
    success(contest.into_view(request_now()))
}

/// POST /api/contests/:id/solution - Attach or clear a solution link.
pub async fn attach_solution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SolutionLinkRequest>,
) -> ApiResult<ContestView> {
    if let Some(link) = request.solution_link.as_deref().map(str::trim) {
        if !link.is_empty() && !(link.starts_with("http://") || link.starts_with("https://")) {
            return Err(AppError::Validation(
                "Solution link must be an http(s) URL".to_string(),
            ));
        }
    }

    let contest = state
        .repo
        .set_solution_link(&id, request.solution_link.as_deref())
        .await?;
    success(contest.into_view(request_now()))
}
