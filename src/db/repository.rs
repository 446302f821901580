//! Database repository for contest records.
//!
//! Upstream-owned columns are written only by [`Repository::upsert_contest`];
//! `bookmarked` and `solution_link` are written only by their dedicated setters.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{Contest, ContestFilter, ContestStatus, Platform, UpstreamContest};

const CONTEST_COLUMNS: &str = "external_id, name, platform, start_time, duration_seconds, link, solution_link, bookmarked, created_at, updated_at";

/// Result of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Database repository for all contest operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a contest or refresh its upstream-owned fields.
    ///
    /// A re-reported contest whose fields did not change is left untouched,
    /// `updated_at` included.
    pub async fn upsert_contest(
        &self,
        contest: &UpstreamContest,
    ) -> Result<UpsertOutcome, AppError> {
        validate_upstream(contest)?;

        let existed = sqlx::query("SELECT 1 FROM contests WHERE external_id = ?")
            .bind(&contest.external_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"INSERT INTO contests (external_id, name, platform, start_time, duration_seconds, link, bookmarked, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
               ON CONFLICT(external_id) DO UPDATE SET
                   name = excluded.name,
                   platform = excluded.platform,
                   start_time = excluded.start_time,
                   duration_seconds = excluded.duration_seconds,
                   link = excluded.link,
                   updated_at = excluded.updated_at
               WHERE contests.name IS NOT excluded.name
                  OR contests.platform IS NOT excluded.platform
                  OR contests.start_time IS NOT excluded.start_time
                  OR contests.duration_seconds IS NOT excluded.duration_seconds
                  OR contests.link IS NOT excluded.link"#,
        )
        .bind(&contest.external_id)
        .bind(&contest.name)
        .bind(contest.platform.as_str())
        .bind(contest.start_time.timestamp())
        .bind(contest.duration_seconds)
        .bind(&contest.link)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(match (existed, result.rows_affected()) {
            (false, _) => UpsertOutcome::Inserted,
            (true, 0) => UpsertOutcome::Unchanged,
            (true, _) => UpsertOutcome::Updated,
        })
    }

    /// Get a contest by external ID.
    pub async fn get_contest(&self, external_id: &str) -> Result<Option<Contest>, AppError> {
        let sql = format!(
            "SELECT {} FROM contests WHERE external_id = ?",
            CONTEST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(contest_from_row).transpose()
    }

    /// Count stored contests.
    pub async fn count_contests(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM contests")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    /// List contests matching the filter, evaluated against `now`.
    ///
    /// Past contests come newest first; everything else in start order.
    pub async fn list_contests(
        &self,
        filter: &ContestFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Contest>, AppError> {
        let mut sql = format!("SELECT {} FROM contests WHERE 1 = 1", CONTEST_COLUMNS);

        if !filter.platforms.is_empty() {
            let placeholders = vec!["?"; filter.platforms.len()].join(", ");
            sql.push_str(&format!(" AND platform IN ({})", placeholders));
        }

        let mut now_binds = 0;
        if let Some(status) = filter.status {
            let (predicate, binds) = status.sql_predicate();
            sql.push_str(" AND ");
            sql.push_str(predicate);
            now_binds = binds;
        }

        match filter.status {
            Some(ContestStatus::Past) => sql.push_str(" ORDER BY start_time DESC, external_id"),
            _ => sql.push_str(" ORDER BY start_time ASC, external_id"),
        }

        let mut query = sqlx::query(&sql);
        for platform in &filter.platforms {
            query = query.bind(platform.as_str());
        }
        let now_ts = now.timestamp();
        for _ in 0..now_binds {
            query = query.bind(now_ts);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(contest_from_row).collect()
    }

    /// Set or clear the bookmark flag.
    pub async fn set_bookmarked(
        &self,
        external_id: &str,
        bookmarked: bool,
    ) -> Result<Contest, AppError> {
        let result = sqlx::query("UPDATE contests SET bookmarked = ? WHERE external_id = ?")
            .bind(bookmarked as i32)
            .bind(external_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(external_id));
        }

        self.get_contest(external_id)
            .await?
            .ok_or_else(|| not_found(external_id))
    }

    /// Attach a solution link; `None` or a blank link clears it.
    pub async fn set_solution_link(
        &self,
        external_id: &str,
        link: Option<&str>,
    ) -> Result<Contest, AppError> {
        let link = link.map(str::trim).filter(|l| !l.is_empty());

        let result = sqlx::query("UPDATE contests SET solution_link = ? WHERE external_id = ?")
            .bind(link)
            .bind(external_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(external_id));
        }

        self.get_contest(external_id)
            .await?
            .ok_or_else(|| not_found(external_id))
    }
}

fn not_found(external_id: &str) -> AppError {
    AppError::NotFound(format!("Contest {} not found", external_id))
}

fn validate_upstream(contest: &UpstreamContest) -> Result<(), AppError> {
    if contest.external_id.trim().is_empty() {
        return Err(AppError::Validation("Contest id is required".to_string()));
    }
    if contest.name.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "Contest {} has no name",
            contest.external_id
        )));
    }
    if contest.link.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "Contest {} has no link",
            contest.external_id
        )));
    }
    Ok(())
}

// Helper functions for row conversion

fn contest_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Contest, AppError> {
    let platform_str: String = row.get("platform");
    let platform = Platform::parse(&platform_str).ok_or_else(|| {
        AppError::Database(format!("Unknown platform {:?} in contests table", platform_str))
    })?;
    let start_ts: i64 = row.get("start_time");
    let start_time = DateTime::from_timestamp(start_ts, 0).ok_or_else(|| {
        AppError::Database(format!("Start time {} out of range", start_ts))
    })?;
    let bookmarked: i32 = row.get("bookmarked");

    Ok(Contest {
        external_id: row.get("external_id"),
        name: row.get("name"),
        platform,
        start_time,
        duration_seconds: row.get("duration_seconds"),
        link: row.get("link"),
        solution_link: row.get("solution_link"),
        bookmarked: bookmarked != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
