//! Tag vocabularies offered when editing and filtering mixes.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::{LocalStore, LocalStoreExt, StoreKey};

pub const DEFAULT_TAGS: [&str; 10] = [
  "Strong", "Sweet", "Sour", "Bitter", "Fruity", "Citrus", "Berry", "Herbal", "Spicy", "Smoky",
];

/// Which list a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagList {
  /// Flavor tags: built-ins plus custom ones
  Mix,
  /// Names of guests a mix was served to. Fully custom.
  Guest,
}

impl TagList {
  fn key(self) -> StoreKey {
    match self {
      TagList::Mix => StoreKey::CustomTags,
      TagList::Guest => StoreKey::GuestTags,
    }
  }
}

pub struct TagCatalog {
  store: Arc<dyn LocalStore>,
  custom: Vec<String>,
  guests: Vec<String>,
}

impl TagCatalog {
  pub fn load(store: Arc<dyn LocalStore>) -> Self {
    let custom = read_list(store.as_ref(), TagList::Mix);
    let guests = read_list(store.as_ref(), TagList::Guest);
    Self {
      store,
      custom,
      guests,
    }
  }

  /// Built-in tags followed by custom ones.
  pub fn all_tags(&self) -> Vec<String> {
    DEFAULT_TAGS
      .iter()
      .map(|t| t.to_string())
      .chain(self.custom.iter().cloned())
      .collect()
  }

  pub fn custom_tags(&self) -> &[String] {
    &self.custom
  }

  pub fn guest_tags(&self) -> &[String] {
    &self.guests
  }

  /// Add a tag. Blank names and names already offered are ignored.
  /// Returns whether the list changed.
  pub fn add(&mut self, list: TagList, tag: &str) -> Result<bool> {
    let tag = tag.trim();
    if tag.is_empty() || self.contains(list, tag) {
      return Ok(false);
    }

    self.entries_mut(list).push(tag.to_string());
    self.persist(list)?;
    debug!(?list, tag, "tag added");
    Ok(true)
  }

  /// Remove a custom tag. Built-in tags cannot be removed.
  pub fn remove(&mut self, list: TagList, tag: &str) -> Result<bool> {
    let tag = tag.trim();
    let entries = self.entries_mut(list);
    let before = entries.len();
    entries.retain(|t| t != tag);
    if entries.len() == before {
      return Ok(false);
    }

    self.persist(list)?;
    debug!(?list, tag, "tag removed");
    Ok(true)
  }

  fn contains(&self, list: TagList, tag: &str) -> bool {
    match list {
      TagList::Mix => DEFAULT_TAGS.contains(&tag) || self.custom.iter().any(|t| t == tag),
      TagList::Guest => self.guests.iter().any(|t| t == tag),
    }
  }

  fn entries_mut(&mut self, list: TagList) -> &mut Vec<String> {
    match list {
      TagList::Mix => &mut self.custom,
      TagList::Guest => &mut self.guests,
    }
  }

  fn persist(&self, list: TagList) -> Result<()> {
    let entries = match list {
      TagList::Mix => &self.custom,
      TagList::Guest => &self.guests,
    };
    self.store.save(&list.key(), entries)
  }
}

fn read_list(store: &dyn LocalStore, list: TagList) -> Vec<String> {
  match store.load::<Vec<String>>(&list.key()) {
    Ok(stored) => stored.map(|s| s.value).unwrap_or_default(),
    Err(e) => {
      warn!(?list, error = %e, "ignoring unreadable tag list");
      Vec::new()
    }
  }
}
