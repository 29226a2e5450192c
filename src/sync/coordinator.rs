use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::error::SyncError;
use super::state::{DataSource, LoadOutcome, LoadState, ReloadPolicy, SyncSnapshot};
use crate::filter::{self, FilterSpec, FilteredView};
use crate::remote::{ApiError, Remote};
use crate::store::{LocalStore, LocalStoreExt, StoreKey};
use crate::types::Mix;

/// Sole writer of the in-memory mix set.
///
/// At most one load runs at a time: a `load()` issued while another is in
/// flight returns [`LoadOutcome::AlreadyLoading`] without touching the
/// network. Writes go straight to the remote store and are followed by a full
/// reload; nothing is merged optimistically.
pub struct SyncCoordinator {
  remote: Arc<dyn Remote>,
  store: Arc<dyn LocalStore>,
  policy: ReloadPolicy,
  snapshot: watch::Sender<SyncSnapshot>,
}

impl SyncCoordinator {
  pub fn new(remote: Arc<dyn Remote>, store: Arc<dyn LocalStore>, policy: ReloadPolicy) -> Self {
    let (snapshot, _) = watch::channel(SyncSnapshot::default());
    Self {
      remote,
      store,
      policy,
      snapshot,
    }
  }

  /// Receive a notification every time the snapshot changes.
  pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
    self.snapshot.subscribe()
  }

  pub fn snapshot(&self) -> SyncSnapshot {
    self.snapshot.borrow().clone()
  }

  pub fn state(&self) -> LoadState {
    self.snapshot.borrow().state.clone()
  }

  pub fn current_scope(&self) -> Option<String> {
    self.snapshot.borrow().profile_id.clone()
  }

  pub fn get(&self, id: &str) -> Option<Mix> {
    self
      .snapshot
      .borrow()
      .mixes
      .iter()
      .find(|m| m.id == id)
      .cloned()
  }

  /// Filtered view of the current mixes. Recomputed on every call.
  pub fn view(&self, spec: &FilterSpec) -> FilteredView {
    filter::apply(&self.snapshot.borrow().mixes, spec)
  }

  /// Show whatever the local store holds for `profile_id` without touching
  /// the network. Returns false if a load is in flight.
  pub fn restore(&self, profile_id: &str) -> bool {
    let switched = self.snapshot.send_if_modified(|snap| {
      if snap.state.is_loading() {
        return false;
      }
      snap.profile_id = Some(profile_id.to_string());
      snap.mixes = Vec::new();
      snap.source = DataSource::None;
      true
    });
    if switched {
      self.hydrate(profile_id);
    }
    switched
  }

  /// Forget the current scope, e.g. after the last profile was deleted.
  pub fn reset(&self) {
    self.snapshot.send_modify(|snap| *snap = SyncSnapshot::default());
  }

  /// Load mixes for `profile_id` from the remote store.
  ///
  /// Cold-start failures are retried with a fixed delay up to the policy's
  /// ceiling. On failure the previous mixes stay in place.
  pub async fn load(&self, profile_id: &str) -> LoadOutcome {
    let mut switched = false;
    let started = self.snapshot.send_if_modified(|snap| {
      if snap.state.is_loading() {
        return false;
      }
      if snap.profile_id.as_deref() != Some(profile_id) {
        snap.profile_id = Some(profile_id.to_string());
        snap.mixes = Vec::new();
        snap.source = DataSource::None;
        switched = true;
      }
      snap.state = LoadState::Loading;
      true
    });

    if !started {
      debug!(profile_id, "load already in flight, skipping");
      return LoadOutcome::AlreadyLoading;
    }
    if switched {
      self.hydrate(profile_id);
    }

    let mut retries = 0;
    loop {
      match self.remote.fetch_mixes(profile_id).await {
        Ok(fetched) => {
          let mixes: Vec<Mix> = fetched
            .into_iter()
            .filter(|m| m.profile_id == profile_id)
            .collect();
          let count = mixes.len();

          if let Err(e) = self.store.save(&StoreKey::mixes(profile_id), &mixes) {
            warn!(profile_id, error = %e, "failed to mirror mixes to local store");
          }

          self.snapshot.send_modify(|snap| {
            snap.mixes = mixes;
            snap.source = DataSource::Network {
              fetched_at: Utc::now(),
            };
            snap.state = LoadState::Loaded;
          });
          info!(profile_id, count, "mixes loaded");
          return LoadOutcome::Loaded { count };
        }
        Err(e) if e.is_transient() && retries < self.policy.max_retries => {
          retries += 1;
          warn!(
            profile_id,
            retry = retries,
            max_retries = self.policy.max_retries,
            "server is waking up, retrying load"
          );
          sleep(self.policy.delay).await;
        }
        Err(e) => {
          let message = match e {
            ApiError::ServerWakingUp => format!(
              "Could not reach the server after {} attempts. Check your connection and try again later.",
              retries + 1
            ),
            other => other.to_string(),
          };
          warn!(profile_id, error = %message, "load failed, keeping previous data");
          self
            .snapshot
            .send_modify(|snap| snap.state = LoadState::Error(message));
          return LoadOutcome::Failed;
        }
      }
    }
  }

  /// Create or update `mix` depending on whether its id is already known,
  /// then reload. On failure nothing local changes.
  pub async fn save(&self, mix: Mix) -> Result<(), SyncError> {
    let exists = self.get(&mix.id).is_some();

    if exists {
      debug!(id = %mix.id, "updating mix");
      self.remote.update_mix(&mix).await?;
    } else {
      debug!(id = %mix.id, "creating mix");
      self.remote.create_mix(&mix).await?;
    }

    let scope = self.current_scope().unwrap_or(mix.profile_id);
    self.reload_after_write(&scope).await;
    Ok(())
  }

  /// Delete a mix remotely, then reload. On failure the mix stays present.
  pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
    self.remote.delete_mix(id).await?;

    if let Some(scope) = self.current_scope() {
      self.reload_after_write(&scope).await;
    }
    Ok(())
  }

  /// Flip a mix between ready and in development.
  pub async fn move_mix(&self, id: &str) -> Result<(), SyncError> {
    let mut mix = self
      .get(id)
      .ok_or_else(|| SyncError::UnknownMix(id.to_string()))?;
    mix.is_in_development = !mix.is_in_development;
    self.save(mix).await
  }

  /// Pretty JSON of the current mixes.
  pub fn export_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&self.snapshot.borrow().mixes)
  }

  /// Create every mix whose id is not already present, re-homed to the
  /// current profile. Returns how many were created.
  pub async fn import(&self, mixes: Vec<Mix>) -> Result<usize, SyncError> {
    let profile_id = self.current_scope().ok_or(SyncError::NoActiveProfile)?;
    let mut known: HashSet<String> = self
      .snapshot
      .borrow()
      .mixes
      .iter()
      .map(|m| m.id.clone())
      .collect();

    let mut created = 0;
    for mut mix in mixes {
      if !known.insert(mix.id.clone()) {
        continue;
      }
      mix.profile_id = profile_id.clone();

      if let Err(source) = self.remote.create_mix(&mix).await {
        if created > 0 {
          self.reload_after_write(&profile_id).await;
        }
        return Err(SyncError::PartialImport { created, source });
      }
      created += 1;
    }

    info!(profile_id, created, "import finished");
    if created > 0 {
      self.reload_after_write(&profile_id).await;
    }
    Ok(created)
  }

  /// Reload after a write. A load already in flight may have read the remote
  /// state before the write landed, so wait for it and load again.
  async fn reload_after_write(&self, profile_id: &str) {
    while self.load(profile_id).await == LoadOutcome::AlreadyLoading {
      debug!(profile_id, "write finished while a load was in flight, waiting");
      let mut rx = self.snapshot.subscribe();
      if rx.wait_for(|snap| !snap.state.is_loading()).await.is_err() {
        return;
      }
    }
  }

  fn hydrate(&self, profile_id: &str) {
    match self.store.load::<Vec<Mix>>(&StoreKey::mixes(profile_id)) {
      Ok(Some(cached)) => {
        let stored_at = cached.stored_at;
        let mixes: Vec<Mix> = cached
          .value
          .into_iter()
          .filter(|m| m.profile_id == profile_id)
          .collect();
        debug!(profile_id, count = mixes.len(), "serving cached mixes");
        self.snapshot.send_modify(|snap| {
          if snap.profile_id.as_deref() == Some(profile_id) {
            snap.mixes = mixes;
            snap.source = DataSource::Cache { stored_at };
          }
        });
      }
      Ok(None) => {}
      Err(e) => warn!(profile_id, error = %e, "ignoring unreadable cache"),
    }
  }
}
