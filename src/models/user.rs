//! Team member model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team member. Belongs to exactly one team via `team_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Caller-supplied unique id.
    pub id: String,

    pub username: String,

    /// Owning team (denormalized).
    pub team_name: String,

    /// Inactive users are never picked as reviewers.
    pub is_active: bool,
}
