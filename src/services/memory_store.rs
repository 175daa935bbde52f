//! In-memory implementation of the store interfaces.
//!
//! All state sits behind one async mutex, so operations are serialized. Each
//! mutation works on a staged copy of the state that is published only when
//! the operation succeeds; an error, a panic or a dropped future leaves the
//! published state untouched. State is lost on restart.
//!
//! The staged copy is a full clone, so every write costs time proportional
//! to everything stored. This adapter is meant for tests and small
//! deployments; use the SQLite store for anything larger.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::selection::{
    candidate_pool, SharedSelector, CREATE_REVIEWER_COUNT, SWAP_REVIEWER_COUNT,
};
use super::store::{now, MembershipStore, ReviewerStore};
use crate::error::AppError;
use crate::models::{
    CreateOutcome, MergeOutcome, NewPullRequest, NewTeam, PullRequest, PullRequestStatus, PullRequestSummary,
    SwapOutcome, Team, TeamMember, User,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    pull_requests: HashMap<String, PullRequest>,
    /// Reviewer ids per pull request, in slot order.
    assignments: HashMap<String, Vec<String>>,
}

impl MemoryState {
    fn user(&self, user_id: &str) -> Result<&User, AppError> {
        self.users
            .get(user_id)
            .ok_or_else(|| AppError::not_found_with_id("User", user_id))
    }

    fn members_of(&self, team_name: &str) -> Vec<User> {
        self.users
            .values()
            .filter(|u| u.team_name == team_name)
            .cloned()
            .collect()
    }

    fn reviewers_of(&self, pr_id: &str) -> Vec<String> {
        self.assignments.get(pr_id).cloned().unwrap_or_default()
    }
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to a staged copy and publish it only on success.
    async fn transaction<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let value = f(&mut staged)?;
        *state = staged;
        Ok(value)
    }
}

#[async_trait]
impl ReviewerStore for InMemoryStore {
    async fn create_pull_request(
        &self,
        pr: NewPullRequest,
        selector: SharedSelector,
    ) -> Result<CreateOutcome, AppError> {
        self.transaction(|state| {
            let author = state.user(&pr.author_id)?.clone();
            let pool = candidate_pool(state.members_of(&author.team_name), &author.id, &[]);
            let reviewers: Vec<String> = selector
                .select(&pool, CREATE_REVIEWER_COUNT)
                .into_iter()
                .map(|u| u.id)
                .collect();

            if state.pull_requests.contains_key(&pr.id) {
                return Err(AppError::pr_exists(pr.id));
            }

            let pull_request = PullRequest {
                id: pr.id,
                name: pr.name,
                author_id: pr.author_id,
                status: PullRequestStatus::Open.to_string(),
                created_at: now(),
                merged_at: None,
            };
            state
                .pull_requests
                .insert(pull_request.id.clone(), pull_request.clone());
            state
                .assignments
                .insert(pull_request.id.clone(), reviewers.clone());

            Ok(CreateOutcome {
                pull_request,
                reviewers,
            })
        })
        .await
    }

    async fn swap_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        selector: SharedSelector,
    ) -> Result<SwapOutcome, AppError> {
        self.transaction(|state| {
            state.user(old_reviewer_id)?;

            let pr = state
                .pull_requests
                .get(pr_id)
                .cloned()
                .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;

            if pr.is_merged() {
                return Err(AppError::pr_merged(pr_id));
            }

            let current = state.reviewers_of(pr_id);
            let Some(slot) = current.iter().position(|id| id == old_reviewer_id) else {
                return Err(AppError::not_assigned(pr_id, old_reviewer_id));
            };

            let team_name = match state.users.get(&pr.author_id) {
                Some(author) => author.team_name.clone(),
                None => {
                    return Err(AppError::internal(format!(
                        "author {} of {} is missing",
                        pr.author_id, pr.id
                    )))
                }
            };
            let excluded: Vec<&str> = current.iter().map(String::as_str).collect();
            let pool = candidate_pool(state.members_of(&team_name), &pr.author_id, &excluded);

            let replacement = selector
                .select(&pool, SWAP_REVIEWER_COUNT)
                .into_iter()
                .next()
                .ok_or_else(|| AppError::no_candidate(pr_id))?;

            let mut reviewers = current;
            reviewers[slot] = replacement.id.clone();
            state.assignments.insert(pr_id.to_string(), reviewers.clone());

            Ok(SwapOutcome {
                pull_request: pr,
                reviewers,
                replaced_by: replacement.id,
            })
        })
        .await
    }

    async fn merge_pull_request(&self, pr_id: &str) -> Result<MergeOutcome, AppError> {
        self.transaction(|state| {
            let pr = state
                .pull_requests
                .get_mut(pr_id)
                .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id))?;

            pr.status = PullRequestStatus::Merged.to_string();
            pr.merged_at = Some(now());
            let merged = pr.clone();

            Ok(MergeOutcome {
                pull_request: merged,
                reviewers: state.reviewers_of(pr_id),
            })
        })
        .await
    }

    async fn reviewers(&self, pr_id: &str) -> Result<Vec<String>, AppError> {
        let state = self.state.lock().await;
        if !state.pull_requests.contains_key(pr_id) {
            return Err(AppError::not_found_with_id("PullRequest", pr_id));
        }
        Ok(state.reviewers_of(pr_id))
    }

    async fn reviews_for_user(&self, user_id: &str) -> Result<Vec<PullRequestSummary>, AppError> {
        let state = self.state.lock().await;
        state.user(user_id)?;

        let mut reviews: Vec<&PullRequest> = state
            .assignments
            .iter()
            .filter(|(_, reviewers)| reviewers.iter().any(|id| id == user_id))
            .filter_map(|(pr_id, _)| state.pull_requests.get(pr_id))
            .collect();
        reviews.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        Ok(reviews.into_iter().map(PullRequest::summary).collect())
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn create_team(&self, team: NewTeam) -> Result<Team, AppError> {
        self.transaction(|state| {
            if !state.teams.insert(team.team_name.clone()) {
                return Err(AppError::team_exists(team.team_name));
            }

            for member in team.members {
                let user = member.into_user(&team.team_name);
                state.users.insert(user.id.clone(), user);
            }

            let members = state
                .members_of(&team.team_name)
                .into_iter()
                .map(TeamMember::from)
                .collect();

            Ok(Team {
                team_name: team.team_name,
                members,
            })
        })
        .await
    }

    async fn team_members(&self, team_name: &str) -> Result<Vec<User>, AppError> {
        let state = self.state.lock().await;
        if !state.teams.contains(team_name) {
            return Err(AppError::not_found_with_id("Team", team_name));
        }
        Ok(state.members_of(team_name))
    }

    async fn user_by_id(&self, user_id: &str) -> Result<User, AppError> {
        let state = self.state.lock().await;
        state.user(user_id).cloned()
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        self.transaction(|state| {
            let user = state
                .users
                .get_mut(user_id)
                .ok_or_else(|| AppError::not_found_with_id("User", user_id))?;
            user.is_active = is_active;
            Ok(user.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::selection::{RandomSelector, ReviewerSelector};
    use std::sync::Arc;

    fn member(id: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: id.to_string(),
            username: id.to_uppercase(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_failed_swap_publishes_nothing() {
        let store = InMemoryStore::new();
        store
            .create_team(NewTeam {
                team_name: "Core".into(),
                members: vec![member("a", true), member("r1", true), member("r2", true)],
            })
            .await
            .unwrap();

        let selector: SharedSelector = Arc::new(RandomSelector::seeded(5));
        store
            .create_pull_request(
                NewPullRequest {
                    id: "p1".into(),
                    name: "Refactor".into(),
                    author_id: "a".into(),
                },
                selector.clone(),
            )
            .await
            .unwrap();

        let err = store.swap_reviewer("p1", "r1", selector).await.unwrap_err();
        assert!(matches!(err, AppError::NoCandidate { .. }));

        let mut reviewers = store.reviewers("p1").await.unwrap();
        reviewers.sort();
        assert_eq!(reviewers, vec!["r1", "r2"]);
    }

    struct PanickingSelector;

    impl ReviewerSelector for PanickingSelector {
        fn select(&self, _pool: &[User], _count: usize) -> Vec<User> {
            panic!("selector failed");
        }
    }

    #[tokio::test]
    async fn test_panic_mid_operation_publishes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_team(NewTeam {
                team_name: "Core".into(),
                members: vec![member("a", true), member("r1", true), member("r2", true)],
            })
            .await
            .unwrap();

        let task_store = store.clone();
        let joined = tokio::spawn(async move {
            task_store
                .create_pull_request(
                    NewPullRequest {
                        id: "p1".into(),
                        name: "Refactor".into(),
                        author_id: "a".into(),
                    },
                    Arc::new(PanickingSelector),
                )
                .await
        })
        .await;
        assert!(joined.unwrap_err().is_panic());

        // The lock was released and the staged copy was discarded
        let err = store.reviewers("p1").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(store.reviews_for_user("r1").await.unwrap().is_empty());
        assert_eq!(store.team_members("Core").await.unwrap().len(), 3);

        let created = store
            .create_pull_request(
                NewPullRequest {
                    id: "p1".into(),
                    name: "Refactor".into(),
                    author_id: "a".into(),
                },
                Arc::new(RandomSelector::seeded(9)),
            )
            .await
            .unwrap();
        assert_eq!(created.reviewers.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_team_is_rejected() {
        let store = InMemoryStore::new();
        let team = NewTeam {
            team_name: "Core".into(),
            members: vec![member("a", true)],
        };
        store.create_team(team.clone()).await.unwrap();

        let err = store.create_team(team).await.unwrap_err();
        assert!(matches!(err, AppError::TeamExists { .. }));
    }

    #[tokio::test]
    async fn test_set_user_active_unknown_user() {
        let store = InMemoryStore::new();
        let err = store.set_user_active("ghost", false).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
