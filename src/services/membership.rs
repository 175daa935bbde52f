//! Team and member management.
//!
//! Writes here are the only way `team_name` and `is_active` change, and the
//! assignment engine reads both when it builds a candidate pool.

use std::sync::Arc;

use super::assignment::{require, RequestScope};
use super::store::{AssignmentStore, MembershipStore};
use crate::error::AppError;
use crate::models::{NewTeam, Team, TeamMember, User};

pub struct MembershipService {
    store: Arc<dyn AssignmentStore>,
}

impl MembershipService {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self { store }
    }

    /// Create a team and upsert its members onto it.
    ///
    /// A member id that already belongs to another team is moved to this
    /// one; its existing reviewer assignments are kept.
    pub async fn create_team(&self, scope: &RequestScope, team: NewTeam) -> Result<Team, AppError> {
        require(&team.team_name, "team_name")?;
        for member in &team.members {
            require(&member.user_id, "user_id")?;
        }

        let team_name = team.team_name.clone();
        let result = scope.run("create team", self.store.create_team(team)).await;

        match &result {
            Ok(created) => log::info!(
                "[membership] req_id={} team={} created with {} members",
                scope.request_id,
                team_name,
                created.members.len()
            ),
            Err(err) => scope.log_failure("membership", "create team", err),
        }
        result
    }

    pub async fn get_team(&self, scope: &RequestScope, team_name: &str) -> Result<Team, AppError> {
        require(team_name, "team_name")?;

        let result = scope
            .run("get team", self.store.team_members(team_name))
            .await;

        match result {
            Ok(members) => Ok(Team {
                team_name: team_name.to_string(),
                members: members.into_iter().map(TeamMember::from).collect(),
            }),
            Err(err) => {
                scope.log_failure("membership", "get team", &err);
                Err(err)
            }
        }
    }

    pub async fn set_user_active(
        &self,
        scope: &RequestScope,
        user_id: &str,
        is_active: bool,
    ) -> Result<User, AppError> {
        require(user_id, "user_id")?;

        let result = scope
            .run(
                "set user active",
                self.store.set_user_active(user_id, is_active),
            )
            .await;

        match &result {
            Ok(_) => log::info!(
                "[membership] req_id={} user={} is_active={}",
                scope.request_id,
                user_id,
                is_active
            ),
            Err(err) => scope.log_failure("membership", "set user active", err),
        }
        result
    }
}
