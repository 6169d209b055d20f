//! Match persistence.
//!
//! The [`MatchStore`] trait is the only surface the orchestrator and the
//! analytics engine see; [`InMemoryMatchStore`] backs tests and cache-free
//! operation, [`SqlMatchStore`] persists to SQLite.

mod memory;
mod sql;
mod traits;

pub use memory::InMemoryMatchStore;
pub use sql::SqlMatchStore;
pub use traits::{MatchStore, StoreError, UpsertOutcome};
