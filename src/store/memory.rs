use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::keys::StoreKey;
use super::traits::{LocalStore, Stored};

/// Store that keeps everything in process memory.
/// Used with `--ephemeral` and in tests; nothing outlives the process.
#[derive(Default)]
pub struct MemoryStore {
  records: Mutex<HashMap<String, Stored<Vec<u8>>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl LocalStore for MemoryStore {
  fn get(&self, key: &StoreKey) -> Result<Option<Stored<Vec<u8>>>> {
    let records = self
      .records
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(records.get(&key.storage_key()).cloned())
  }

  fn put(&self, key: &StoreKey, data: &[u8]) -> Result<()> {
    let mut records = self
      .records
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    records.insert(
      key.storage_key(),
      Stored {
        value: data.to_vec(),
        stored_at: Utc::now(),
      },
    );
    Ok(())
  }

  fn remove(&self, key: &StoreKey) -> Result<()> {
    let mut records = self
      .records
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    records.remove(&key.storage_key());
    Ok(())
  }
}
