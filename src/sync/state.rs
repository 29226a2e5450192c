use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::types::Mix;

/// Load state machine: `Idle -> Loading -> {Loaded, Error}`, and back to
/// `Loading` on the next load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
  /// Nothing requested yet
  #[default]
  Idle,
  /// A load is in flight; further loads are no-ops
  Loading,
  /// Last load succeeded
  Loaded,
  /// Last load failed with a human-readable message
  Error(String),
}

impl LoadState {
  pub fn is_loading(&self) -> bool {
    matches!(self, LoadState::Loading)
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      LoadState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Indicates where the current mixes came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSource {
  #[default]
  None,
  /// Canonical data from the last successful load
  Network { fetched_at: DateTime<Utc> },
  /// Possibly stale copy from the local store
  Cache { stored_at: DateTime<Utc> },
}

/// Everything the presentation layer needs to render the current scope.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
  pub state: LoadState,
  /// Profile the mixes belong to
  pub profile_id: Option<String>,
  pub mixes: Vec<Mix>,
  pub source: DataSource,
}

/// Result of a `load()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  Loaded { count: usize },
  Failed,
  /// Another load was in flight; nothing was done
  AlreadyLoading,
}

/// Coarse retry of cold-start failures on loads, layered over the gateway's
/// own backoff. Fixed delay so the worst-case latency stays bounded.
#[derive(Debug, Clone)]
pub struct ReloadPolicy {
  pub max_retries: u32,
  pub delay: Duration,
}

impl Default for ReloadPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      delay: Duration::from_secs(5),
    }
  }
}
