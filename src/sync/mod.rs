//! Reconciles the remote catalog with the local store and owns the canonical
//! in-memory mix set for the active profile.

mod coordinator;
mod error;
mod state;

pub use coordinator::SyncCoordinator;
pub use error::SyncError;
pub use state::{DataSource, LoadState, ReloadPolicy};
