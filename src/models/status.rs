//! Temporal status of a contest, derived from its start time and duration.
//!
//! The status is never stored. It is computed at read time by [`classify`], and
//! the storage layer filters with [`ContestStatus::sql_predicate`], which encodes
//! the same rule as a boolean expression over `start_time` and `duration_seconds`.
//!
//! A contest whose duration is unknown is never considered ongoing: it is
//! upcoming before its start and past from its start onward.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where a contest sits relative to the current instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    Upcoming,
    Ongoing,
    Past,
}

impl ContestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestStatus::Upcoming => "upcoming",
            ContestStatus::Ongoing => "ongoing",
            ContestStatus::Past => "past",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Some(ContestStatus::Upcoming),
            "ongoing" => Some(ContestStatus::Ongoing),
            "past" => Some(ContestStatus::Past),
            _ => None,
        }
    }

    /// SQL condition selecting the contests with this status.
    ///
    /// Returns the expression and the number of `?` placeholders in it; every
    /// placeholder must be bound to the current instant in unix seconds.
    pub fn sql_predicate(&self) -> (&'static str, usize) {
        match self {
            ContestStatus::Upcoming => ("start_time > ?", 1),
            ContestStatus::Ongoing => (
                "(duration_seconds IS NOT NULL AND start_time <= ? AND start_time + duration_seconds >= ?)",
                2,
            ),
            ContestStatus::Past => (
                "((duration_seconds IS NULL AND start_time <= ?) OR (duration_seconds IS NOT NULL AND start_time + duration_seconds < ?))",
                2,
            ),
        }
    }
}

impl std::fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a contest against `now`.
///
/// The ongoing window is closed at both ends: `now == start` and
/// `now == start + duration` are both ongoing. A duration too large to add to
/// `start_time` keeps the contest ongoing.
pub fn classify(
    start_time: DateTime<Utc>,
    duration_seconds: Option<i64>,
    now: DateTime<Utc>,
) -> ContestStatus {
    if now < start_time {
        return ContestStatus::Upcoming;
    }

    let Some(secs) = duration_seconds else {
        return ContestStatus::Past;
    };

    // An end beyond the representable range never arrives.
    match Duration::try_seconds(secs).and_then(|d| start_time.checked_add_signed(d)) {
        Some(end) if now > end => ContestStatus::Past,
        _ => ContestStatus::Ongoing,
    }
}
