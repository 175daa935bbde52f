//! Application error types.
//!
//! Every operation of the assignment engine returns `AppError`. Store-level
//! failures are translated into this taxonomy at the store boundary, so no
//! driver error type escapes into the public contract.

use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;

/// Status class of an error, used by the request layer to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or duplicate input (400).
    ClientError,
    /// Missing entity (404).
    NotFound,
    /// Business-rule violation detected from store state (409).
    Conflict,
    /// Anything unanticipated (500).
    ServerError,
}

/// Application-level errors.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Requested resource not found.
    #[error("resource not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// A team with this name already exists.
    #[error("team_name already exists")]
    TeamExists { team_name: String },

    /// A pull request with this id already exists.
    #[error("PR id already exists")]
    PrExists { pr_id: String },

    /// The pull request is merged; reviewers can no longer change.
    #[error("cannot reassign on merged PR")]
    PrMerged { pr_id: String },

    /// The user is not an assigned reviewer of the pull request.
    #[error("reviewer is not assigned to this PR")]
    NotAssigned { pr_id: String, user_id: String },

    /// No active teammate is left to take over the review.
    #[error("no active replacement candidate in team")]
    NoCandidate { pr_id: String },

    /// Invalid input provided.
    #[error("bad request: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
        /// Busy/locked/connection failures; the whole transaction may be retried.
        transient: bool,
    },

    /// The caller's deadline elapsed before the operation finished.
    #[error("deadline exceeded during {operation}")]
    Timeout { operation: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn team_exists(team_name: impl Into<String>) -> Self {
        Self::TeamExists {
            team_name: team_name.into(),
        }
    }

    pub fn pr_exists(pr_id: impl Into<String>) -> Self {
        Self::PrExists {
            pr_id: pr_id.into(),
        }
    }

    pub fn pr_merged(pr_id: impl Into<String>) -> Self {
        Self::PrMerged {
            pr_id: pr_id.into(),
        }
    }

    pub fn not_assigned(pr_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::NotAssigned {
            pr_id: pr_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn no_candidate(pr_id: impl Into<String>) -> Self {
        Self::NoCandidate {
            pr_id: pr_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
            transient: false,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(
        message: impl Into<String>,
        operation: impl Into<String>,
        transient: bool,
    ) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
            transient,
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wire-level error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TeamExists { .. } => "TEAM_EXISTS",
            Self::PrExists { .. } => "PR_EXISTS",
            Self::PrMerged { .. } => "PR_MERGED",
            Self::NotAssigned { .. } => "NOT_ASSIGNED",
            Self::NoCandidate { .. } => "NO_CANDIDATE",
            Self::InvalidInput { .. } => "BAD_REQUEST",
            Self::Database { .. } | Self::Timeout { .. } | Self::Internal { .. } => "INTERNAL",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::TeamExists { .. } | Self::InvalidInput { .. } => ErrorKind::ClientError,
            Self::PrExists { .. }
            | Self::PrMerged { .. }
            | Self::NotAssigned { .. }
            | Self::NoCandidate { .. } => ErrorKind::Conflict,
            Self::Database { .. } | Self::Timeout { .. } | Self::Internal { .. } => {
                ErrorKind::ServerError
            }
        }
    }

    /// Whether the caller may retry the whole operation.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database { transient, .. } => *transient,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Message safe to hand to a client. Server-class errors never expose
    /// store detail.
    pub fn public_message(&self) -> Cow<'static, str> {
        match self.kind() {
            ErrorKind::ServerError => Cow::Borrowed("internal server error"),
            _ => Cow::Owned(self.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let transient = crate::db::tx::is_transient(&err);
        Self::Database {
            message: err.to_string(),
            operation: None,
            transient,
        }
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}
