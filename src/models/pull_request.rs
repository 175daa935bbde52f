//! Pull request model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle state of a pull request. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl From<&str> for PullRequestStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MERGED" => Self::Merged,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Merged => write!(f, "MERGED"),
        }
    }
}

/// A pull request as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PullRequest {
    /// Caller-supplied unique id.
    pub id: String,

    pub name: String,

    /// User id of the author.
    pub author_id: String,

    /// Current state: `OPEN` or `MERGED`.
    pub status: String,

    /// Creation timestamp (Unix seconds).
    pub created_at: i64,

    /// Merge timestamp (Unix seconds, if merged).
    pub merged_at: Option<i64>,
}

impl PullRequest {
    /// Parse the status string into an enum.
    pub fn status_enum(&self) -> PullRequestStatus {
        PullRequestStatus::from(self.status.as_str())
    }

    pub fn is_merged(&self) -> bool {
        self.status_enum() == PullRequestStatus::Merged
    }

    pub fn summary(&self) -> PullRequestSummary {
        PullRequestSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            author_id: self.author_id.clone(),
            status: self.status.clone(),
        }
    }
}

/// Short pull request record used in per-reviewer listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PullRequestSummary {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: String,
}

/// Input for opening a pull request.
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
}

/// Result of opening a pull request.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// Row as inserted, status `OPEN`.
    pub pull_request: PullRequest,
    /// Assigned reviewer ids (0, 1 or 2 entries), in slot order.
    pub reviewers: Vec<String>,
}

/// Result of a successful reviewer swap.
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    /// Pull request as read inside the swap transaction.
    pub pull_request: PullRequest,
    /// Full reviewer set after the swap, in slot order.
    pub reviewers: Vec<String>,
    /// The reviewer that took over.
    pub replaced_by: String,
}

/// Result of a merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub pull_request: PullRequest,
    pub reviewers: Vec<String>,
}
