//! Local persistence for offline support.
//!
//! This module provides a business-logic-free key-value store that:
//! - Keeps one serialized collection per (entity kind, profile) pair
//! - Records the active profile id and the base URL override
//! - Remembers when each record was written, so stale data can be labelled

mod keys;
mod memory;
mod sqlite;
mod traits;

pub use keys::StoreKey;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{LocalStore, LocalStoreExt};
