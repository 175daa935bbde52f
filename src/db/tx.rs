//! Scoped transactions and driver error classification.
//!
//! `run_transaction` owns the whole begin/commit/rollback lifecycle: the
//! body receives a connection that is inside the transaction and returns a
//! result. The transaction commits only when the body returns `Ok`. On
//! `Err` it is rolled back explicitly; on panic or when the future is
//! dropped (deadline elapsed) sqlx rolls it back when the handle drops.

use crate::db::pool::DbPool;
use crate::error::AppError;
use futures::future::BoxFuture;
use sqlx::SqliteConnection;

/// How a transaction acquires SQLite locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// `BEGIN DEFERRED`: consistent snapshot for reads, no write lock.
    Read,
    /// `BEGIN IMMEDIATE`: takes the write lock up front so concurrent writers
    /// run one after another (serializable), and never fail on lock upgrade.
    Write,
}

impl TxMode {
    fn begin_statement(self) -> &'static str {
        match self {
            Self::Read => "BEGIN DEFERRED",
            Self::Write => "BEGIN IMMEDIATE",
        }
    }
}

/// Run `body` inside a single transaction.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `mode` - Lock acquisition mode
/// * `operation` - Label used in logs and error context
/// * `body` - Transaction body
pub async fn run_transaction<T, F>(
    pool: &DbPool,
    mode: TxMode,
    operation: &'static str,
    body: F,
) -> Result<T, AppError>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, AppError>> + Send,
{
    let mut tx = pool
        .begin_with(mode.begin_statement())
        .await
        .map_err(|e| translate(e, operation))?;

    match body(&mut *tx).await {
        Ok(value) => {
            tx.commit().await.map_err(|e| translate(e, operation))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                log::warn!("[db] Rollback of {} failed: {}", operation, rollback_err);
            }
            Err(err)
        }
    }
}

/// Translate a driver error into the application taxonomy, keeping the
/// operation label for the logs.
pub fn translate(err: sqlx::Error, operation: &str) -> AppError {
    let transient = is_transient(&err);
    AppError::database_with_op(err.to_string(), operation, transient)
}

/// Whether the statement failed on a UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err.as_database_error() {
        // SQLITE_CONSTRAINT_PRIMARYKEY (1555), SQLITE_CONSTRAINT_UNIQUE (2067)
        Some(db_err) => {
            db_err.is_unique_violation()
                || matches!(db_err.code().as_deref(), Some("1555") | Some("2067"))
        }
        None => false,
    }
}

/// Whether retrying the whole transaction could succeed.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            // BUSY, LOCKED, BUSY_RECOVERY, LOCKED_SHAREDCACHE, BUSY_SNAPSHOT
            Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
        ),
        _ => false,
    }
}
