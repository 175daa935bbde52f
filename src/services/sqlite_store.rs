//! SQLite adapter for the store interfaces.
//!
//! Mutations run under `TxMode::Write` (`BEGIN IMMEDIATE`), so two
//! concurrent creates or swaps on the same team never interleave: the second
//! one reads the first one's committed rows.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use super::selection::{
    candidate_pool, SharedSelector, CREATE_REVIEWER_COUNT, SWAP_REVIEWER_COUNT,
};
use super::store::{now, MembershipStore, ReviewerStore};
use crate::db::pool::DbPool;
use crate::db::tx::{is_unique_violation, run_transaction, TxMode};
use crate::error::AppError;
use crate::models::{
    CreateOutcome, MergeOutcome, NewPullRequest, NewTeam, PullRequest, PullRequestStatus, PullRequestSummary,
    SwapOutcome, Team, TeamMember, User,
};

/// Store backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

async fn fetch_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, team_name, is_active FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(user)
}

async fn fetch_team_members(
    conn: &mut SqliteConnection,
    team_name: &str,
) -> Result<Vec<User>, AppError> {
    let members = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, team_name, is_active
        FROM users
        WHERE team_name = ?
        ORDER BY id
        "#,
    )
    .bind(team_name)
    .fetch_all(&mut *conn)
    .await?;

    Ok(members)
}

async fn team_exists(conn: &mut SqliteConnection, team_name: &str) -> Result<bool, AppError> {
    let exists = sqlx::query("SELECT 1 FROM teams WHERE name = ?")
        .bind(team_name)
        .fetch_optional(&mut *conn)
        .await?
        .is_some();

    Ok(exists)
}

async fn fetch_pull_request(
    conn: &mut SqliteConnection,
    pr_id: &str,
) -> Result<Option<PullRequest>, AppError> {
    let pr = sqlx::query_as::<_, PullRequest>(
        r#"
        SELECT id, name, author_id, status, created_at, merged_at
        FROM pull_requests
        WHERE id = ?
        "#,
    )
    .bind(pr_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(pr)
}

async fn fetch_reviewer_ids(
    conn: &mut SqliteConnection,
    pr_id: &str,
) -> Result<Vec<String>, AppError> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM assignments WHERE pull_request_id = ? ORDER BY rowid",
    )
    .bind(pr_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

#[async_trait]
impl ReviewerStore for SqliteStore {
    async fn create_pull_request(
        &self,
        pr: NewPullRequest,
        selector: SharedSelector,
    ) -> Result<CreateOutcome, AppError> {
        run_transaction(&self.pool, TxMode::Write, "create pull request", move |conn| {
            Box::pin(async move {
                let author = fetch_user(conn, &pr.author_id)
                    .await?
                    .ok_or_else(|| AppError::not_found_with_id("User", pr.author_id.clone()))?;

                let members = fetch_team_members(conn, &author.team_name).await?;
                let pool = candidate_pool(members, &author.id, &[]);
                let reviewers: Vec<String> = selector
                    .select(&pool, CREATE_REVIEWER_COUNT)
                    .into_iter()
                    .map(|u| u.id)
                    .collect();

                let pull_request = PullRequest {
                    id: pr.id,
                    name: pr.name,
                    author_id: pr.author_id,
                    status: PullRequestStatus::Open.to_string(),
                    created_at: now(),
                    merged_at: None,
                };

                let inserted = sqlx::query(
                    r#"
                    INSERT INTO pull_requests (id, name, author_id, status, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&pull_request.id)
                .bind(&pull_request.name)
                .bind(&pull_request.author_id)
                .bind(&pull_request.status)
                .bind(pull_request.created_at)
                .execute(&mut *conn)
                .await;

                if let Err(err) = inserted {
                    return Err(if is_unique_violation(&err) {
                        AppError::pr_exists(pull_request.id)
                    } else {
                        err.into()
                    });
                }

                for reviewer_id in &reviewers {
                    sqlx::query("INSERT INTO assignments (pull_request_id, user_id) VALUES (?, ?)")
                        .bind(&pull_request.id)
                        .bind(reviewer_id)
                        .execute(&mut *conn)
                        .await?;
                }

                Ok(CreateOutcome {
                    pull_request,
                    reviewers,
                })
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
        let pr_id = pr_id.to_string();
        let old_reviewer_id = old_reviewer_id.to_string();

        run_transaction(&self.pool, TxMode::Write, "swap reviewer", move |conn| {
            Box::pin(async move {
                if fetch_user(conn, &old_reviewer_id).await?.is_none() {
                    return Err(AppError::not_found_with_id("User", old_reviewer_id));
                }

                let pr = fetch_pull_request(conn, &pr_id)
                    .await?
                    .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id.clone()))?;

                if pr.is_merged() {
                    return Err(AppError::pr_merged(pr_id));
                }

                let current = fetch_reviewer_ids(conn, &pr_id).await?;
                if !current.iter().any(|id| id == &old_reviewer_id) {
                    return Err(AppError::not_assigned(pr_id, old_reviewer_id));
                }

                // users are never deleted, so a missing author is a broken row
                let author = fetch_user(conn, &pr.author_id).await?.ok_or_else(|| {
                    AppError::internal(format!("author {} of {} is missing", pr.author_id, pr.id))
                })?;

                // `current` still contains the reviewer being replaced
                let members = fetch_team_members(conn, &author.team_name).await?;
                let excluded: Vec<&str> = current.iter().map(String::as_str).collect();
                let pool = candidate_pool(members, &pr.author_id, &excluded);

                let replacement = selector
                    .select(&pool, SWAP_REVIEWER_COUNT)
                    .into_iter()
                    .next()
                    .ok_or_else(|| AppError::no_candidate(pr_id.clone()))?;

                let updated = sqlx::query(
                    r#"
                    UPDATE assignments
                    SET user_id = ?
                    WHERE pull_request_id = ? AND user_id = ?
                    "#,
                )
                .bind(&replacement.id)
                .bind(&pr_id)
                .bind(&old_reviewer_id)
                .execute(&mut *conn)
                .await?;

                // The write lock is held since the assignment check above
                if updated.rows_affected() != 1 {
                    return Err(AppError::internal(format!(
                        "assignment of {} on {} changed inside the swap transaction",
                        old_reviewer_id, pr_id
                    )));
                }

                let reviewers = fetch_reviewer_ids(conn, &pr_id).await?;

                Ok(SwapOutcome {
                    pull_request: pr,
                    reviewers,
                    replaced_by: replacement.id,
                })
            })
        })
        .await
    }

    async fn merge_pull_request(&self, pr_id: &str) -> Result<MergeOutcome, AppError> {
        let pr_id = pr_id.to_string();

        run_transaction(&self.pool, TxMode::Write, "merge pull request", move |conn| {
            Box::pin(async move {
                let merged = sqlx::query_as::<_, PullRequest>(
                    r#"
                    UPDATE pull_requests
                    SET status = ?, merged_at = ?
                    WHERE id = ?
                    RETURNING id, name, author_id, status, created_at, merged_at
                    "#,
                )
                .bind(PullRequestStatus::Merged.to_string())
                .bind(now())
                .bind(&pr_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| AppError::not_found_with_id("PullRequest", pr_id.clone()))?;

                let reviewers = fetch_reviewer_ids(conn, &pr_id).await?;

                Ok(MergeOutcome {
                    pull_request: merged,
                    reviewers,
                })
            })
        })
        .await
    }

    async fn reviewers(&self, pr_id: &str) -> Result<Vec<String>, AppError> {
        let pr_id = pr_id.to_string();

        run_transaction(&self.pool, TxMode::Read, "read reviewers", move |conn| {
            Box::pin(async move {
                if fetch_pull_request(conn, &pr_id).await?.is_none() {
                    return Err(AppError::not_found_with_id("PullRequest", pr_id));
                }
                fetch_reviewer_ids(conn, &pr_id).await
            })
        })
        .await
    }

    async fn reviews_for_user(&self, user_id: &str) -> Result<Vec<PullRequestSummary>, AppError> {
        let user_id = user_id.to_string();

        run_transaction(&self.pool, TxMode::Read, "reviews for user", move |conn| {
            Box::pin(async move {
                if fetch_user(conn, &user_id).await?.is_none() {
                    return Err(AppError::not_found_with_id("User", user_id));
                }

                let reviews = sqlx::query_as::<_, PullRequestSummary>(
                    r#"
                    SELECT pr.id, pr.name, pr.author_id, pr.status
                    FROM pull_requests AS pr
                    JOIN assignments AS a ON a.pull_request_id = pr.id
                    WHERE a.user_id = ?
                    ORDER BY pr.created_at, pr.id
                    "#,
                )
                .bind(&user_id)
                .fetch_all(&mut *conn)
                .await?;

                Ok(reviews)
            })
        })
        .await
    }
}

#[async_trait]
impl MembershipStore for SqliteStore {
    async fn create_team(&self, team: NewTeam) -> Result<Team, AppError> {
        run_transaction(&self.pool, TxMode::Write, "create team", move |conn| {
            Box::pin(async move {
                let inserted = sqlx::query("INSERT INTO teams (name) VALUES (?)")
                    .bind(&team.team_name)
                    .execute(&mut *conn)
                    .await;

                if let Err(err) = inserted {
                    return Err(if is_unique_violation(&err) {
                        AppError::team_exists(team.team_name.clone())
                    } else {
                        err.into()
                    });
                }

                for member in &team.members {
                    sqlx::query(
                        r#"
                        INSERT INTO users (id, username, team_name, is_active)
                        VALUES (?, ?, ?, ?)
                        ON CONFLICT (id) DO UPDATE SET
                            username = excluded.username,
                            team_name = excluded.team_name,
                            is_active = excluded.is_active
                        "#,
                    )
                    .bind(&member.user_id)
                    .bind(&member.username)
                    .bind(&team.team_name)
                    .bind(member.is_active)
                    .execute(&mut *conn)
                    .await?;
                }

                let members = fetch_team_members(conn, &team.team_name).await?;

                Ok(Team {
                    team_name: team.team_name,
                    members: members.into_iter().map(TeamMember::from).collect(),
                })
            })
        })
        .await
    }

    async fn team_members(&self, team_name: &str) -> Result<Vec<User>, AppError> {
        let team_name = team_name.to_string();

        run_transaction(&self.pool, TxMode::Read, "team members", move |conn| {
            Box::pin(async move {
                if !team_exists(conn, &team_name).await? {
                    return Err(AppError::not_found_with_id("Team", team_name));
                }
                fetch_team_members(conn, &team_name).await
            })
        })
        .await
    }

    async fn user_by_id(&self, user_id: &str) -> Result<User, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut *conn, user_id)
            .await?
            .ok_or_else(|| AppError::not_found_with_id("User", user_id))
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_active = ?
            WHERE id = ?
            RETURNING id, username, team_name, is_active
            "#,
        )
        .bind(is_active)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| AppError::not_found_with_id("User", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::selection::RandomSelector;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, SqliteStore) {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("store.db"), 2)
            .await
            .unwrap();
        (dir, SqliteStore::new(pool))
    }

    fn member(id: &str, active: bool) -> TeamMember {
        TeamMember {
            user_id: id.to_string(),
            username: id.to_uppercase(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_team_upsert_moves_user() {
        let (_dir, store) = setup().await;

        store
            .create_team(NewTeam {
                team_name: "Backend".into(),
                members: vec![member("u1", true), member("u2", true)],
            })
            .await
            .unwrap();
        let frontend = store
            .create_team(NewTeam {
                team_name: "Frontend".into(),
                members: vec![member("u2", false)],
            })
            .await
            .unwrap();

        assert_eq!(frontend.members.len(), 1);
        let moved = store.user_by_id("u2").await.unwrap();
        assert_eq!(moved.team_name, "Frontend");
        assert!(!moved.is_active);

        let backend = store.team_members("Backend").await.unwrap();
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_rows() {
        let (_dir, store) = setup().await;
        store
            .create_team(NewTeam {
                team_name: "Core".into(),
                members: vec![member("a", true), member("r1", true)],
            })
            .await
            .unwrap();

        let selector: SharedSelector = Arc::new(RandomSelector::seeded(3));
        let pr = NewPullRequest {
            id: "p1".into(),
            name: "Add feature".into(),
            author_id: "a".into(),
        };
        store
            .create_pull_request(pr.clone(), selector.clone())
            .await
            .unwrap();

        let err = store
            .create_pull_request(pr, selector)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PrExists { .. }));

        let assignments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assignments")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(assignments, 1);
    }

    #[tokio::test]
    async fn test_unknown_team_is_not_found() {
        let (_dir, store) = setup().await;
        let err = store.team_members("Nobody").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_swap_with_missing_author_is_internal() {
        let (_dir, store) = setup().await;
        store
            .create_team(NewTeam {
                team_name: "Core".into(),
                members: vec![member("a", true), member("r1", true), member("r2", true)],
            })
            .await
            .unwrap();

        let selector: SharedSelector = Arc::new(RandomSelector::seeded(4));
        let created = store
            .create_pull_request(
                NewPullRequest {
                    id: "p1".into(),
                    name: "Add feature".into(),
                    author_id: "a".into(),
                },
                selector.clone(),
            )
            .await
            .unwrap();
        assert_eq!(created.pull_request.status, "OPEN");

        // Corrupt the row behind the foreign key's back
        let mut conn = store.pool().acquire().await.unwrap();
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("DELETE FROM users WHERE id = 'a'")
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);

        let err = store
            .swap_reviewer("p1", &created.reviewers[0], selector)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }), "{:?}", err);
        assert_eq!(err.code(), "INTERNAL");
        assert_eq!(err.public_message(), "internal server error");
    }
}
