//! Reviewer Assign - pull request reviewer assignment service.
//!
//! Teams own users, users author pull requests, and each open pull request
//! gets up to two active teammates of its author as reviewers. The library
//! exposes the assignment engine over two interchangeable stores (SQLite and
//! in-memory) plus a small HTTP surface.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use config::{Config, StorageKind};
use error::AppError;
use services::{
    ApiState, AssignmentEngine, AssignmentStore, InMemoryStore, MembershipService,
    RandomSelector, SharedSelector, SqliteStore,
};

/// Open the store adapter selected by `config`.
pub async fn build_store(config: &Config) -> Result<Arc<dyn AssignmentStore>, AppError> {
    match config.storage {
        StorageKind::Sqlite => {
            let pool = db::initialize(&config.database_path, config.max_connections).await?;
            log::info!(
                "[app] Using SQLite store at {}",
                config.database_path.display()
            );
            Ok(Arc::new(SqliteStore::new(pool)))
        }
        StorageKind::Memory => {
            log::info!("[app] Using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Reviewer selector for `config`: seeded when a seed is configured.
pub fn build_selector(config: &Config) -> SharedSelector {
    match config.selection_seed {
        Some(seed) => {
            log::info!("[app] Reviewer selection seeded with {}", seed);
            Arc::new(RandomSelector::seeded(seed))
        }
        None => Arc::new(RandomSelector::from_entropy()),
    }
}

/// Wire services over `store` into the state shared by the HTTP routes.
pub fn build_state(
    store: Arc<dyn AssignmentStore>,
    selector: SharedSelector,
    config: &Config,
) -> ApiState {
    ApiState {
        engine: Arc::new(AssignmentEngine::new(store.clone(), selector)),
        membership: Arc::new(MembershipService::new(store)),
        request_timeout: config.request_timeout,
    }
}
