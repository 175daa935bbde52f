//! Business logic services.
//!
//! The assignment engine and membership service sit on top of the store
//! traits; `sqlite_store` and `memory_store` are the two adapters. The HTTP
//! layer is a thin shell over the services.

pub mod assignment;
pub mod http_api;
pub mod membership;
pub mod memory_store;
pub mod selection;
pub mod server;
pub mod sqlite_store;
pub mod store;

pub use assignment::{AssignmentEngine, RequestScope};
pub use http_api::ApiState;
pub use membership::MembershipService;
pub use memory_store::InMemoryStore;
pub use selection::{RandomSelector, ReviewerSelector, SharedSelector};
pub use server::{start_server, ServerHandle};
pub use sqlite_store::SqliteStore;
pub use store::{AssignmentStore, MembershipStore, ReviewerStore};
