//! Active-profile selection.
//!
//! Exactly one locally known profile is active at a time (or none when there
//! are no profiles). The remote store does not enforce this; it is kept here
//! and persisted alongside the profile list. Every change of the active
//! profile reloads the coordinator for the new scope.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::remote::Remote;
use crate::store::{LocalStore, LocalStoreExt, StoreKey};
use crate::sync::{SyncCoordinator, SyncError};
use crate::types::Profile;

pub struct ProfileScope {
  remote: Arc<dyn Remote>,
  store: Arc<dyn LocalStore>,
  coordinator: Arc<SyncCoordinator>,
  profiles: Vec<Profile>,
}

impl ProfileScope {
  pub fn new(
    remote: Arc<dyn Remote>,
    store: Arc<dyn LocalStore>,
    coordinator: Arc<SyncCoordinator>,
  ) -> Self {
    Self {
      remote,
      store,
      coordinator,
      profiles: Vec::new(),
    }
  }

  pub fn profiles(&self) -> &[Profile] {
    &self.profiles
  }

  pub fn current_active(&self) -> Option<&Profile> {
    self.profiles.iter().find(|p| p.is_active)
  }

  fn active_id(&self) -> Option<String> {
    self.current_active().map(|p| p.id.clone())
  }

  /// Hydrate profiles and the active id from the local store, and point the
  /// coordinator at the cached mixes of the active profile.
  pub fn restore(&mut self) {
    let profiles = match self.store.load::<Vec<Profile>>(&StoreKey::profiles()) {
      Ok(stored) => stored.map(|s| s.value).unwrap_or_default(),
      Err(e) => {
        warn!(error = %e, "ignoring unreadable profile cache");
        Vec::new()
      }
    };
    let active = match self.store.load::<String>(&StoreKey::ActiveProfile) {
      Ok(stored) => stored.map(|s| s.value),
      Err(e) => {
        warn!(error = %e, "ignoring unreadable active profile id");
        None
      }
    };

    self.profiles = profiles;
    self.mark_active(active.as_deref());
    debug!(count = self.profiles.len(), active = ?self.active_id(), "profiles restored");

    if let Some(id) = self.active_id() {
      self.coordinator.restore(&id);
    }
  }

  /// Fetch the profile list from the remote store and reconcile it.
  pub async fn refresh(&mut self) -> Result<(), SyncError> {
    let profiles = self.remote.fetch_profiles().await?;
    self.on_profiles_changed(profiles).await;
    Ok(())
  }

  /// Replace the known profile set.
  ///
  /// The previous active profile stays active if it still exists. Otherwise
  /// the first profile the server flags as active wins, then the first
  /// profile in the list, then none.
  pub async fn on_profiles_changed(&mut self, profiles: Vec<Profile>) {
    let previous = self.active_id();
    let next = previous
      .clone()
      .filter(|id| profiles.iter().any(|p| &p.id == id))
      .or_else(|| profiles.iter().find(|p| p.is_active).map(|p| p.id.clone()))
      .or_else(|| profiles.first().map(|p| p.id.clone()));

    self.profiles = profiles;
    self.mark_active(next.as_deref());
    self.persist();

    if next != previous {
      self.switch_scope().await;
    }
  }

  /// Make `profile_id` the only active profile and load its mixes.
  pub async fn activate(&mut self, profile_id: &str) -> Result<(), SyncError> {
    if !self.profiles.iter().any(|p| p.id == profile_id) {
      return Err(SyncError::UnknownProfile(profile_id.to_string()));
    }

    self.mark_active(Some(profile_id));
    self.persist();
    info!(profile_id, "profile activated");

    self.switch_scope().await;
    Ok(())
  }

  /// Create a profile remotely. The first profile becomes active.
  pub async fn create(&mut self, name: &str) -> Result<Profile, SyncError> {
    let mut profile = self.remote.create_profile(name).await?;
    profile.is_active = false;
    self.profiles.push(profile.clone());
    self.persist();
    info!(id = %profile.id, name, "profile created");

    if self.profiles.len() == 1 {
      self.activate(&profile.id).await?;
    }
    Ok(profile)
  }

  pub async fn rename(&mut self, profile_id: &str, name: &str) -> Result<Profile, SyncError> {
    let mut profile = self
      .profiles
      .iter()
      .find(|p| p.id == profile_id)
      .cloned()
      .ok_or_else(|| SyncError::UnknownProfile(profile_id.to_string()))?;
    profile.name = name.to_string();

    let mut updated = self.remote.update_profile(&profile).await?;
    updated.is_active = profile.is_active;

    if let Some(slot) = self.profiles.iter_mut().find(|p| p.id == profile_id) {
      *slot = updated.clone();
    }
    self.persist();
    Ok(updated)
  }

  /// Delete a profile remotely and locally. Deleting the active profile
  /// promotes the first remaining one.
  pub async fn delete(&mut self, profile_id: &str) -> Result<(), SyncError> {
    if !self.profiles.iter().any(|p| p.id == profile_id) {
      return Err(SyncError::UnknownProfile(profile_id.to_string()));
    }
    self.remote.delete_profile(profile_id).await?;

    let was_active = self.active_id().as_deref() == Some(profile_id);
    self.profiles.retain(|p| p.id != profile_id);
    if let Err(e) = self.store.remove(&StoreKey::mixes(profile_id)) {
      warn!(profile_id, error = %e, "failed to drop cached mixes");
    }

    if was_active {
      let next = self.profiles.first().map(|p| p.id.clone());
      self.mark_active(next.as_deref());
    }
    self.persist();
    info!(profile_id, "profile deleted");

    if was_active {
      self.switch_scope().await;
    }
    Ok(())
  }

  fn mark_active(&mut self, profile_id: Option<&str>) {
    for profile in &mut self.profiles {
      profile.is_active = Some(profile.id.as_str()) == profile_id;
    }
  }

  async fn switch_scope(&self) {
    match self.active_id() {
      Some(id) => {
        self.coordinator.load(&id).await;
      }
      None => self.coordinator.reset(),
    }
  }

  fn persist(&self) {
    if let Err(e) = self.store.save(&StoreKey::profiles(), &self.profiles) {
      warn!(error = %e, "failed to persist profiles");
    }
    let result = match self.active_id() {
      Some(id) => self.store.save(&StoreKey::ActiveProfile, &id),
      None => self.store.remove(&StoreKey::ActiveProfile),
    };
    if let Err(e) = result {
      warn!(error = %e, "failed to persist active profile");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::fake::FakeRemote;
  use crate::store::MemoryStore;
  use crate::sync::{LoadState, ReloadPolicy};
  use crate::types::Mix;

  fn profile(id: &str, name: &str) -> Profile {
    Profile {
      id: id.to_string(),
      name: name.to_string(),
      is_active: false,
      created_at: None,
      updated_at: None,
    }
  }

  fn setup(profiles: Vec<Profile>) -> (Arc<FakeRemote>, Arc<MemoryStore>, ProfileScope) {
    let remote = Arc::new(FakeRemote::with_profiles(profiles));
    let mut a = Mix::new("a", "Alpha mix");
    a.id = "m-a".to_string();
    let mut b = Mix::new("b", "Beta mix");
    b.id = "m-b".to_string();
    *remote.mixes.lock().unwrap() = vec![a, b];

    let store = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(SyncCoordinator::new(
      remote.clone(),
      store.clone(),
      ReloadPolicy::default(),
    ));
    let scope = ProfileScope::new(remote.clone(), store.clone(), coordinator);
    (remote, store, scope)
  }

  fn active_count(scope: &ProfileScope) -> usize {
    scope.profiles().iter().filter(|p| p.is_active).count()
  }

  #[tokio::test]
  async fn test_activate_is_exclusive_and_reloads() {
    let (remote, _store, mut scope) = setup(vec![profile("a", "A"), profile("b", "B")]);
    scope.refresh().await.unwrap();
    assert_eq!(scope.current_active().unwrap().id, "a");

    scope.activate("b").await.unwrap();

    assert_eq!(active_count(&scope), 1);
    assert_eq!(scope.current_active().unwrap().id, "b");
    assert_eq!(remote.count("fetch_mixes:b"), 1);

    let snap = scope.coordinator.snapshot();
    assert_eq!(snap.profile_id.as_deref(), Some("b"));
    assert_eq!(snap.mixes.len(), 1);
    assert_eq!(snap.mixes[0].id, "m-b");
  }

  #[tokio::test]
  async fn test_activate_unknown_profile() {
    let (_remote, _store, mut scope) = setup(vec![profile("a", "A")]);
    scope.refresh().await.unwrap();

    assert!(matches!(
      scope.activate("zzz").await,
      Err(SyncError::UnknownProfile(_))
    ));
    assert_eq!(scope.current_active().unwrap().id, "a");
  }

  #[tokio::test]
  async fn test_refresh_keeps_previous_active() {
    let (remote, _store, mut scope) = setup(vec![profile("a", "A"), profile("b", "B")]);
    scope.refresh().await.unwrap();
    scope.activate("b").await.unwrap();

    remote.profiles.lock().unwrap().push(profile("c", "C"));
    scope.refresh().await.unwrap();

    assert_eq!(scope.profiles().len(), 3);
    assert_eq!(scope.current_active().unwrap().id, "b");
    assert_eq!(active_count(&scope), 1);
  }

  #[tokio::test]
  async fn test_delete_active_promotes_first_remaining() {
    let (_remote, store, mut scope) = setup(vec![
      profile("a", "A"),
      profile("b", "B"),
      profile("c", "C"),
    ]);
    scope.refresh().await.unwrap();
    scope.activate("b").await.unwrap();
    assert!(store.get(&StoreKey::mixes("b")).unwrap().is_some());

    scope.delete("b").await.unwrap();

    assert_eq!(scope.current_active().unwrap().id, "a");
    assert_eq!(active_count(&scope), 1);
    assert!(store.get(&StoreKey::mixes("b")).unwrap().is_none());
    assert_eq!(
      scope.coordinator.current_scope().as_deref(),
      Some("a")
    );
  }

  #[tokio::test]
  async fn test_delete_last_profile_leaves_none() {
    let (_remote, store, mut scope) = setup(vec![profile("a", "A")]);
    scope.refresh().await.unwrap();

    scope.delete("a").await.unwrap();

    assert!(scope.current_active().is_none());
    assert!(store.get(&StoreKey::ActiveProfile).unwrap().is_none());
    assert_eq!(scope.coordinator.state(), LoadState::Idle);
    assert!(scope.coordinator.current_scope().is_none());
  }

  #[tokio::test]
  async fn test_first_created_profile_becomes_active() {
    let (_remote, _store, mut scope) = setup(vec![]);
    scope.refresh().await.unwrap();
    assert!(scope.current_active().is_none());

    let first = scope.create("Home").await.unwrap();
    assert_eq!(scope.current_active().unwrap().id, first.id);

    scope.create("Party").await.unwrap();
    assert_eq!(scope.current_active().unwrap().id, first.id);
    assert_eq!(active_count(&scope), 1);
  }

  #[tokio::test]
  async fn test_rename_keeps_active_flag() {
    let (remote, _store, mut scope) = setup(vec![profile("a", "A")]);
    scope.refresh().await.unwrap();

    let renamed = scope.rename("a", "Kitchen").await.unwrap();
    assert_eq!(renamed.name, "Kitchen");
    assert!(renamed.is_active);
    assert_eq!(remote.profiles.lock().unwrap()[0].name, "Kitchen");
  }

  #[tokio::test]
  async fn test_restore_from_store() {
    let (remote, store, mut scope) = setup(vec![profile("a", "A"), profile("b", "B")]);
    scope.refresh().await.unwrap();
    scope.activate("b").await.unwrap();

    let coordinator = Arc::new(SyncCoordinator::new(
      remote.clone(),
      store.clone(),
      ReloadPolicy::default(),
    ));
    let mut restored = ProfileScope::new(remote.clone(), store.clone(), coordinator.clone());
    restored.restore();

    assert_eq!(restored.current_active().unwrap().id, "b");
    let snap = coordinator.snapshot();
    assert_eq!(snap.mixes.len(), 1);
    assert!(matches!(snap.source, crate::sync::DataSource::Cache { .. }));
  }
}
