//! Contest model shared by the ingestion pipeline and the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{classify, ContestStatus};

/// Contest platforms the tracker knows how to ingest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Platform {
    Codeforces,
    CodeChef,
    Leetcode,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Codeforces => "Codeforces",
            Platform::CodeChef => "CodeChef",
            Platform::Leetcode => "Leetcode",
        }
    }

    /// Parse a platform name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "codeforces" => Some(Platform::Codeforces),
            "codechef" => Some(Platform::CodeChef),
            "leetcode" => Some(Platform::Leetcode),
            _ => None,
        }
    }

    /// Prefix used to namespace external ids coming from this platform.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Platform::Codeforces => "cf",
            Platform::CodeChef => "cc",
            Platform::Leetcode => "lc",
        }
    }

    /// Build the namespaced external id for a provider-local id.
    pub fn external_id(&self, local_id: &str) -> String {
        format!("{}_{}", self.id_prefix(), local_id)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contest as reported by an upstream provider, after normalization.
///
/// Carries only the fields the providers own. Locally owned fields
/// (`bookmarked`, `solution_link`) never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamContest {
    pub external_id: String,
    pub name: String,
    pub platform: Platform,
    pub start_time: DateTime<Utc>,
    /// `None` when the provider does not report a duration
    pub duration_seconds: Option<i64>,
    pub link: String,
}

/// A stored contest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contest {
    pub external_id: String,
    pub name: String,
    pub platform: Platform,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_link: Option<String>,
    pub bookmarked: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Contest {
    pub fn status_at(&self, now: DateTime<Utc>) -> ContestStatus {
        classify(self.start_time, self.duration_seconds, now)
    }

    /// Label the contest with its status for presentation.
    pub fn into_view(self, now: DateTime<Utc>) -> ContestView {
        let status = self.status_at(now);
        ContestView {
            contest: self,
            status,
        }
    }
}

/// A contest together with its derived status, as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ContestView {
    #[serde(flatten)]
    pub contest: Contest,
    pub status: ContestStatus,
}

/// Filter for listing stored contests.
#[derive(Debug, Clone, Default)]
pub struct ContestFilter {
    /// Empty means every platform
    pub platforms: Vec<Platform>,
    pub status: Option<ContestStatus>,
}

/// Request body for attaching a solution link.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionLinkRequest {
    /// `None` or an empty string clears the link
    #[serde(default, alias = "youtubeLink")]
    pub solution_link: Option<String>,
}
