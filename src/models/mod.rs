//! Data models for teams, members and pull requests.
//!
//! Models derive Serialize for the HTTP layer and FromRow for SQLx queries.

pub mod pull_request;
pub mod team;
pub mod user;

pub use pull_request::{
    CreateOutcome, MergeOutcome, NewPullRequest, PullRequest, PullRequestStatus, PullRequestSummary, SwapOutcome,
};
pub use team::{NewTeam, Team, TeamMember};
pub use user::User;
