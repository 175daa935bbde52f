//! Reviewer assignment engine.
//!
//! Validates input shape, then runs one store operation under the caller's
//! deadline. The store does the transactional work; the engine never holds
//! state of its own between calls and never retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::selection::SharedSelector;
use super::store::{AssignmentStore, ReviewerStore};
use crate::error::{AppError, ErrorKind};
use crate::models::{CreateOutcome, MergeOutcome, NewPullRequest, PullRequestSummary, SwapOutcome};

/// Request-scoped values passed explicitly to every operation.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub request_id: String,
    /// Who asked, when known.
    pub actor_id: Option<String>,
    deadline: Instant,
}

impl RequestScope {
    /// Scope with a fresh request id and a deadline `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_request_id(uuid::Uuid::new_v4().to_string(), timeout)
    }

    pub fn with_request_id(request_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            request_id: request_id.into(),
            actor_id: None,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Run `fut` until the deadline. An elapsed deadline drops the future,
    /// which rolls back any open transaction.
    pub(crate) async fn run<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        // timeout_at polls the inner future once even when already expired
        if Instant::now() >= self.deadline {
            return Err(AppError::timeout(operation));
        }

        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(operation)),
        }
    }

    pub(crate) fn log_failure(&self, component: &str, operation: &str, err: &AppError) {
        let actor = self.actor_id.as_deref().unwrap_or("-");
        match err.kind() {
            ErrorKind::ServerError => log::error!(
                "[{}] req_id={} actor={} {} failed: {:?}",
                component,
                self.request_id,
                actor,
                operation,
                err
            ),
            _ => log::warn!(
                "[{}] req_id={} actor={} {} rejected: {} ({})",
                component,
                self.request_id,
                actor,
                operation,
                err.code(),
                err
            ),
        }
    }
}

/// Reject empty required fields before any transaction starts.
pub(crate) fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            format!("{} must not be empty", field),
            field,
        ));
    }
    Ok(())
}

/// Orchestrates create, swap, merge and the reviewer reads.
pub struct AssignmentEngine {
    store: Arc<dyn AssignmentStore>,
    selector: SharedSelector,
}

impl AssignmentEngine {
    pub fn new(store: Arc<dyn AssignmentStore>, selector: SharedSelector) -> Self {
        Self { store, selector }
    }

    /// Open a pull request and assign up to two reviewers.
    ///
    /// # Returns
    /// The inserted pull request and its reviewer ids (0, 1 or 2 entries).
    pub async fn create(
        &self,
        scope: &RequestScope,
        pr: NewPullRequest,
    ) -> Result<CreateOutcome, AppError> {
        require(&pr.id, "pull_request_id")?;
        require(&pr.name, "pull_request_name")?;
        require(&pr.author_id, "author_id")?;

        let result = scope
            .run(
                "create",
                self.store.create_pull_request(pr, self.selector.clone()),
            )
            .await;

        match &result {
            Ok(created) => log::info!(
                "[assign] req_id={} pr={} created with reviewers {:?}",
                scope.request_id,
                created.pull_request.id,
                created.reviewers
            ),
            Err(err) => scope.log_failure("assign", "create", err),
        }
        result
    }

    /// Replace one reviewer with a new teammate.
    pub async fn swap(
        &self,
        scope: &RequestScope,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<SwapOutcome, AppError> {
        require(pr_id, "pull_request_id")?;
        require(old_reviewer_id, "old_reviewer_id")?;

        let result = scope
            .run(
                "swap",
                self.store
                    .swap_reviewer(pr_id, old_reviewer_id, self.selector.clone()),
            )
            .await;

        match &result {
            Ok(outcome) => log::info!(
                "[assign] req_id={} pr={} reviewer {} replaced by {}",
                scope.request_id,
                pr_id,
                old_reviewer_id,
                outcome.replaced_by
            ),
            Err(err) => scope.log_failure("assign", "swap", err),
        }
        result
    }

    /// Mark a pull request merged. Calling it again re-stamps `merged_at`.
    pub async fn merge(&self, scope: &RequestScope, pr_id: &str) -> Result<MergeOutcome, AppError> {
        require(pr_id, "pull_request_id")?;

        let result = scope
            .run("merge", self.store.merge_pull_request(pr_id))
            .await;

        match &result {
            Ok(_) => log::info!("[assign] req_id={} pr={} merged", scope.request_id, pr_id),
            Err(err) => scope.log_failure("assign", "merge", err),
        }
        result
    }

    pub async fn reviewers(&self, scope: &RequestScope, pr_id: &str) -> Result<Vec<String>, AppError> {
        require(pr_id, "pull_request_id")?;

        let result = scope
            .run("read reviewers", self.store.reviewers(pr_id))
            .await;
        if let Err(err) = &result {
            scope.log_failure("assign", "read reviewers", err);
        }
        result
    }

    /// Pull requests a user currently reviews.
    pub async fn reviews_for_user(
        &self,
        scope: &RequestScope,
        user_id: &str,
    ) -> Result<Vec<PullRequestSummary>, AppError> {
        require(user_id, "user_id")?;

        let result = scope
            .run("reviews for user", self.store.reviews_for_user(user_id))
            .await;
        if let Err(err) = &result {
            scope.log_failure("assign", "reviews for user", err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::InMemoryStore;
    use crate::services::selection::RandomSelector;

    fn engine() -> AssignmentEngine {
        AssignmentEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(RandomSelector::seeded(11)),
        )
    }

    #[test]
    fn test_require_rejects_blank() {
        let err = require("  ", "author_id").unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
        assert!(require("a", "author_id").is_ok());
    }

    #[tokio::test]
    async fn test_empty_fields_rejected_before_store() {
        let engine = engine();
        let scope = RequestScope::new(Duration::from_secs(1));

        let err = engine
            .create(
                &scope,
                NewPullRequest {
                    id: "p1".into(),
                    name: String::new(),
                    author_id: "a".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { ref field, .. } if field.as_deref() == Some("pull_request_name")));

        let err = engine.swap(&scope, "p1", "").await.unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_elapsed_deadline_is_timeout() {
        let scope = RequestScope::new(Duration::from_millis(10));
        let result: Result<(), AppError> = scope
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_scope_carries_actor() {
        let scope = RequestScope::with_request_id("req-1", Duration::from_secs(5)).with_actor("u1");
        assert_eq!(scope.request_id, "req-1");
        assert_eq!(scope.actor_id.as_deref(), Some("u1"));
    }
}
