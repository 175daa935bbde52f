//! Store capability interfaces.
//!
//! The assignment engine only talks to these traits. Each backing store
//! provides one adapter (`SqliteStore`, `InMemoryStore`); every mutating
//! method runs as exactly one transaction and maps store failures into
//! `AppError` before returning.

use async_trait::async_trait;

use super::selection::SharedSelector;
use crate::error::AppError;
use crate::models::{
    CreateOutcome, MergeOutcome, NewPullRequest, NewTeam, PullRequestSummary, SwapOutcome, Team, User,
};

/// Pull request and reviewer-assignment operations.
#[async_trait]
pub trait ReviewerStore: Send + Sync {
    /// Open a pull request and assign up to two reviewers from the author's team.
    ///
    /// Fails with `NotFound` when the author is unknown and `PrExists` when
    /// the id is taken. Returns the inserted row and its reviewer ids.
    async fn create_pull_request(
        &self,
        pr: NewPullRequest,
        selector: SharedSelector,
    ) -> Result<CreateOutcome, AppError>;

    /// Replace `old_reviewer_id` with a fresh teammate.
    ///
    /// Fails with `NotFound`, `PrMerged`, `NotAssigned` or `NoCandidate`.
    async fn swap_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        selector: SharedSelector,
    ) -> Result<SwapOutcome, AppError>;

    /// Mark a pull request merged and stamp the merge time.
    async fn merge_pull_request(&self, pr_id: &str) -> Result<MergeOutcome, AppError>;

    /// Current reviewer ids of a pull request, in slot order.
    async fn reviewers(&self, pr_id: &str) -> Result<Vec<String>, AppError>;

    /// Pull requests the user is currently assigned to review.
    async fn reviews_for_user(&self, user_id: &str) -> Result<Vec<PullRequestSummary>, AppError>;
}

/// Team and member operations.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Create a team and upsert its members onto it.
    ///
    /// Fails with `TeamExists` when the name is taken.
    async fn create_team(&self, team: NewTeam) -> Result<Team, AppError>;

    /// Members of a team sorted by id. `NotFound` when the team does not exist.
    async fn team_members(&self, team_name: &str) -> Result<Vec<User>, AppError>;

    async fn user_by_id(&self, user_id: &str) -> Result<User, AppError>;

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError>;
}

/// Everything the service needs from one backing store.
pub trait AssignmentStore: ReviewerStore + MembershipStore {}

impl<T: ReviewerStore + MembershipStore> AssignmentStore for T {}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
