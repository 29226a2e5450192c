use std::fmt;

use crate::types::EntityKind;

/// Logical record names in the local store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
  /// Serialized entity collection, optionally scoped to an owning profile
  Collection {
    kind: EntityKind,
    profile_id: Option<String>,
  },
  /// Id of the locally active profile
  ActiveProfile,
  /// Runtime override of the server base URL
  BaseUrl,
  /// User-defined mix tags
  CustomTags,
  /// User-defined guest tags
  GuestTags,
}

impl StoreKey {
  /// Mixes owned by `profile_id`.
  pub fn mixes(profile_id: &str) -> Self {
    Self::Collection {
      kind: EntityKind::Mixes,
      profile_id: Some(profile_id.to_string()),
    }
  }

  /// The full profile list.
  pub fn profiles() -> Self {
    Self::Collection {
      kind: EntityKind::Profiles,
      profile_id: None,
    }
  }

  /// Stable string form used as the storage primary key.
  pub fn storage_key(&self) -> String {
    match self {
      Self::Collection {
        kind,
        profile_id: Some(profile_id),
      } => format!("{}:{}", kind.path(), profile_id),
      Self::Collection {
        kind,
        profile_id: None,
      } => kind.path().to_string(),
      Self::ActiveProfile => "active_profile_id".to_string(),
      Self::BaseUrl => "base_url".to_string(),
      Self::CustomTags => "custom_tags".to_string(),
      Self::GuestTags => "guest_tags".to_string(),
    }
  }
}

impl fmt::Display for StoreKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.storage_key())
  }
}
