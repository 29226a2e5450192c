//! Core traits and types for the local store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};

use super::keys::StoreKey;

/// A value read back from the store, with the time it was written.
#[derive(Debug, Clone)]
pub struct Stored<T> {
  pub value: T,
  pub stored_at: DateTime<Utc>,
}

/// Generic persisted key-value capability.
///
/// Values are opaque bytes; use [`LocalStoreExt`] for typed JSON access.
pub trait LocalStore: Send + Sync {
  /// Read the raw bytes stored under `key`.
  fn get(&self, key: &StoreKey) -> Result<Option<Stored<Vec<u8>>>>;

  /// Replace whatever is stored under `key`.
  fn put(&self, key: &StoreKey, data: &[u8]) -> Result<()>;

  /// Remove `key`. Removing a missing key is not an error.
  fn remove(&self, key: &StoreKey) -> Result<()>;
}

/// Typed JSON helpers on top of any [`LocalStore`].
pub trait LocalStoreExt: LocalStore {
  fn load<T: DeserializeOwned>(&self, key: &StoreKey) -> Result<Option<Stored<T>>> {
    let Some(raw) = self.get(key)? else {
      return Ok(None);
    };
    let value = serde_json::from_slice(&raw.value)
      .map_err(|e| eyre!("Failed to deserialize {}: {}", key, e))?;
    Ok(Some(Stored {
      value,
      stored_at: raw.stored_at,
    }))
  }

  fn save<T: Serialize + ?Sized>(&self, key: &StoreKey, value: &T) -> Result<()> {
    let data =
      serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    self.put(key, &data)
  }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}
