//! Team model.

use serde::{Deserialize, Serialize};

use super::User;

/// Member entry supplied when creating a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl TeamMember {
    /// Materialize this entry as a user of `team_name`.
    pub fn into_user(self, team_name: &str) -> User {
        User {
            id: self.user_id,
            username: self.username,
            team_name: team_name.to_string(),
            is_active: self.is_active,
        }
    }
}

impl From<User> for TeamMember {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            is_active: user.is_active,
        }
    }
}

/// A team with its current members, sorted by user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

/// Input for creating a team.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}
