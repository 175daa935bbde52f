//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use reviewer_assign::db;
use reviewer_assign::models::{NewPullRequest, NewTeam, TeamMember};
use reviewer_assign::services::{
    AssignmentEngine, AssignmentStore, InMemoryStore, MembershipService, RandomSelector,
    RequestScope, SqliteStore,
};
use tempfile::TempDir;

/// One engine wired over one store adapter.
pub struct Fixture {
    pub label: &'static str,
    pub engine: AssignmentEngine,
    pub membership: MembershipService,
    pub store: Arc<dyn AssignmentStore>,
    // Keeps the SQLite file alive for the test's duration
    _dir: Option<TempDir>,
}

pub async fn sqlite_fixture(seed: u64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("reviewers.db"), 5)
        .await
        .unwrap();
    build("sqlite", Arc::new(SqliteStore::new(pool)), seed, Some(dir))
}

pub fn memory_fixture(seed: u64) -> Fixture {
    build("memory", Arc::new(InMemoryStore::new()), seed, None)
}

/// Both adapters, seeded identically.
pub async fn fixtures(seed: u64) -> Vec<Fixture> {
    vec![sqlite_fixture(seed).await, memory_fixture(seed)]
}

fn build(
    label: &'static str,
    store: Arc<dyn AssignmentStore>,
    seed: u64,
    dir: Option<TempDir>,
) -> Fixture {
    Fixture {
        label,
        engine: AssignmentEngine::new(store.clone(), Arc::new(RandomSelector::seeded(seed))),
        membership: MembershipService::new(store.clone()),
        store,
        _dir: dir,
    }
}

pub fn scope() -> RequestScope {
    RequestScope::new(Duration::from_secs(10))
}

pub fn member(id: &str, active: bool) -> TeamMember {
    TeamMember {
        user_id: id.to_string(),
        username: format!("user-{}", id),
        is_active: active,
    }
}

pub fn pr(id: &str, author_id: &str) -> NewPullRequest {
    NewPullRequest {
        id: id.to_string(),
        name: format!("Change {}", id),
        author_id: author_id.to_string(),
    }
}

impl Fixture {
    pub async fn team(&self, team_name: &str, members: Vec<TeamMember>) {
        self.membership
            .create_team(
                &scope(),
                NewTeam {
                    team_name: team_name.to_string(),
                    members,
                },
            )
            .await
            .unwrap();
    }

    pub async fn sorted_reviewers(&self, pr_id: &str) -> Vec<String> {
        let mut reviewers = self.engine.reviewers(&scope(), pr_id).await.unwrap();
        reviewers.sort();
        reviewers
    }
}
