//! REST routes over the assignment engine.
//!
//! Handlers only decode requests, build a `RequestScope` and shape
//! responses; every rule lives in the engine and the stores.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assignment::{AssignmentEngine, RequestScope};
use super::membership::MembershipService;
use crate::error::{AppError, ErrorKind};
use crate::models::{NewPullRequest, NewTeam, PullRequest, PullRequestSummary, Team, TeamMember, User};

/// Shared state for the axum routes.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<AssignmentEngine>,
    pub membership: Arc<MembershipService>,
    pub request_timeout: Duration,
}

impl ApiState {
    /// Scope for one request. The actor is `x-actor-id` when sent, otherwise
    /// the user the request is about.
    fn scope(&self, headers: &HeaderMap, subject: Option<&str>) -> RequestScope {
        let scope = match header_value(headers, "x-request-id") {
            Some(request_id) => RequestScope::with_request_id(request_id, self.request_timeout),
            None => RequestScope::new(self.request_timeout),
        };
        match header_value(headers, "x-actor-id").or(subject) {
            Some(actor) => scope.with_actor(actor),
            None => scope,
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::ClientError => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorEnvelope {
                error: ErrorBody {
                    code: self.0.code(),
                    message: self.0.public_message().into_owned(),
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        log::warn!("[http] Rejected request body: {}", rejection.body_text());
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        log::warn!("[http] Rejected query string: {}", rejection.body_text());
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Serialize)]
struct TeamResponse {
    team: Team,
}

#[derive(Debug, Deserialize)]
struct TeamQuery {
    team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
struct UserBody {
    user_id: String,
    username: String,
    team_name: String,
    is_active: bool,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            team_name: user.team_name,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserResponse {
    user: UserBody,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct PullRequestShort {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
}

impl From<PullRequestSummary> for PullRequestShort {
    fn from(pr: PullRequestSummary) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserReviewsResponse {
    user_id: String,
    pull_requests: Vec<PullRequestShort>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergePrRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_reviewer_id: String,
}

#[derive(Debug, Deserialize)]
struct PrQuery {
    pull_request_id: String,
}

#[derive(Debug, Serialize)]
struct PullRequestBody {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: String,
    assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    merged_at: Option<DateTime<Utc>>,
}

impl PullRequestBody {
    fn new(pr: PullRequest, reviewers: Vec<String>, with_dates: bool) -> Self {
        let (created_at, merged_at) = if with_dates {
            (
                DateTime::from_timestamp(pr.created_at, 0),
                pr.merged_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            )
        } else {
            (None, None)
        };

        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status,
            assigned_reviewers: reviewers,
            created_at,
            merged_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct PrResponse {
    pr: PullRequestBody,
}

#[derive(Debug, Serialize)]
struct ReassignResponse {
    pr: PullRequestBody,
    replaced_by: String,
}

#[derive(Debug, Serialize)]
struct ReviewersResponse {
    pull_request_id: String,
    assigned_reviewers: Vec<String>,
}

// ── Route builder ────────────────────────────────────────────────────────────

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/team/add", post(create_team))
        .route("/team/get", get(get_team))
        .route("/users/setIsActive", post(set_user_active))
        .route("/users/getReview", get(get_user_reviews))
        .route("/pullRequest/create", post(create_pull_request))
        .route("/pullRequest/merge", post(merge_pull_request))
        .route("/pullRequest/reassign", post(reassign_reviewer))
        .route("/pullRequest/reviewers", get(get_reviewers))
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /team/add
async fn create_team(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<CreateTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiErr> {
    let Json(body) = body?;
    let scope = state.scope(&headers, None);

    let team = state
        .membership
        .create_team(
            &scope,
            NewTeam {
                team_name: body.team_name,
                members: body.members,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// GET /team/get?team_name=X
async fn get_team(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<TeamResponse>, ApiErr> {
    let Query(query) = query?;
    let scope = state.scope(&headers, None);

    let team = state.membership.get_team(&scope, &query.team_name).await?;
    Ok(Json(TeamResponse { team }))
}

/// POST /users/setIsActive
async fn set_user_active(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<SetActiveRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiErr> {
    let Json(body) = body?;
    let scope = state.scope(&headers, Some(&body.user_id));

    let user = state
        .membership
        .set_user_active(&scope, &body.user_id, body.is_active)
        .await?;

    Ok(Json(UserResponse { user: user.into() }))
}

/// GET /users/getReview?user_id=X
async fn get_user_reviews(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserReviewsResponse>, ApiErr> {
    let Query(query) = query?;
    let scope = state.scope(&headers, Some(&query.user_id));

    let reviews = state.engine.reviews_for_user(&scope, &query.user_id).await?;

    Ok(Json(UserReviewsResponse {
        user_id: query.user_id,
        pull_requests: reviews.into_iter().map(PullRequestShort::from).collect(),
    }))
}

/// POST /pullRequest/create
async fn create_pull_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<CreatePrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PrResponse>), ApiErr> {
    let Json(body) = body?;
    let scope = state.scope(&headers, Some(&body.author_id));

    let created = state
        .engine
        .create(
            &scope,
            NewPullRequest {
                id: body.pull_request_id,
                name: body.pull_request_name,
                author_id: body.author_id,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PrResponse {
            pr: PullRequestBody::new(created.pull_request, created.reviewers, false),
        }),
    ))
}

/// POST /pullRequest/merge
async fn merge_pull_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<MergePrRequest>, JsonRejection>,
) -> Result<Json<PrResponse>, ApiErr> {
    let Json(body) = body?;
    let scope = state.scope(&headers, None);

    let outcome = state.engine.merge(&scope, &body.pull_request_id).await?;

    Ok(Json(PrResponse {
        pr: PullRequestBody::new(outcome.pull_request, outcome.reviewers, true),
    }))
}

/// POST /pullRequest/reassign
async fn reassign_reviewer(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<ReassignResponse>, ApiErr> {
    let Json(body) = body?;
    let scope = state.scope(&headers, Some(&body.old_reviewer_id));

    let outcome = state
        .engine
        .swap(&scope, &body.pull_request_id, &body.old_reviewer_id)
        .await?;

    Ok(Json(ReassignResponse {
        pr: PullRequestBody::new(outcome.pull_request, outcome.reviewers, false),
        replaced_by: outcome.replaced_by,
    }))
}

/// GET /pullRequest/reviewers?pull_request_id=X
async fn get_reviewers(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<PrQuery>, QueryRejection>,
) -> Result<Json<ReviewersResponse>, ApiErr> {
    let Query(query) = query?;
    let scope = state.scope(&headers, None);

    let reviewers = state.engine.reviewers(&scope, &query.pull_request_id).await?;

    Ok(Json(ReviewersResponse {
        pull_request_id: query.pull_request_id,
        assigned_reviewers: reviewers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryStore, RandomSelector};
    use axum::http::HeaderValue;

    fn state() -> ApiState {
        let store = Arc::new(InMemoryStore::new());
        ApiState {
            engine: Arc::new(AssignmentEngine::new(
                store.clone(),
                Arc::new(RandomSelector::seeded(3)),
            )),
            membership: Arc::new(MembershipService::new(store)),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_scope_actor_falls_back_to_subject() {
        let state = state();
        let mut headers = HeaderMap::new();

        let scope = state.scope(&headers, Some("r1"));
        assert_eq!(scope.actor_id.as_deref(), Some("r1"));
        assert!(!scope.request_id.is_empty());

        let scope = state.scope(&headers, None);
        assert_eq!(scope.actor_id, None);

        headers.insert("x-request-id", HeaderValue::from_static("req-7"));
        headers.insert("x-actor-id", HeaderValue::from_static("lead"));
        let scope = state.scope(&headers, Some("r1"));
        assert_eq!(scope.request_id, "req-7");
        assert_eq!(scope.actor_id.as_deref(), Some("lead"));

        let scope = state.scope(&headers, None);
        assert_eq!(scope.actor_id.as_deref(), Some("lead"));
    }

    #[test]
    fn test_blank_headers_ignored() {
        let state = state();
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static(""));
        headers.insert("x-actor-id", HeaderValue::from_static(""));

        let scope = state.scope(&headers, Some("a"));
        assert!(!scope.request_id.is_empty());
        assert_eq!(scope.actor_id.as_deref(), Some("a"));
    }
}
