//! Domain entities synchronized between the remote catalog and the local store.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

pub const MIN_STRENGTH: u8 = 0;
pub const MAX_STRENGTH: u8 = 10;

/// Remote collections, used both for REST paths and local storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
  Mixes,
  Profiles,
}

impl EntityKind {
  pub fn path(self) -> &'static str {
    match self {
      EntityKind::Mixes => "mixes",
      EntityKind::Profiles => "profiles",
    }
  }
}

/// Trait for entities that live in a remote collection.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Identifier used in `/<collection>/:id` routes
  fn id(&self) -> &str;

  /// Collection this entity belongs to
  fn kind() -> EntityKind;
}

/// A mix recipe owned by exactly one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mix {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  pub profile_id: String,
  pub name: String,
  #[serde(default)]
  pub composition: String,
  #[serde(deserialize_with = "deserialize_strength")]
  pub strength: u8,
  #[serde(default)]
  pub notes: String,
  #[serde(default, deserialize_with = "deserialize_unique")]
  pub tags: Vec<String>,
  /// Older payloads omit this field entirely
  #[serde(default, deserialize_with = "deserialize_unique")]
  pub guest_tags: Vec<String>,
  pub is_in_development: bool,
}

impl Mix {
  /// Create a new draft mix with a freshly generated id.
  pub fn new(profile_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      profile_id: profile_id.into(),
      name: name.into(),
      composition: String::new(),
      strength: 5,
      notes: String::new(),
      tags: Vec::new(),
      guest_tags: Vec::new(),
      is_in_development: true,
    }
  }

  pub fn set_strength(&mut self, strength: i64) {
    self.strength = clamp_strength(strength);
  }

  pub fn set_tags<I, S>(&mut self, tags: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.tags = unique(tags.into_iter().map(Into::into));
  }

  pub fn set_guest_tags<I, S>(&mut self, tags: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.guest_tags = unique(tags.into_iter().map(Into::into));
  }

  /// Plain-text rendering for sharing a recipe.
  pub fn share_text(&self) -> String {
    let mut text = format!("{}\nStrength: {}/{}\n\n", self.name, self.strength, MAX_STRENGTH);
    text.push_str(&format!("Composition:\n{}\n", self.composition));

    if !self.notes.is_empty() {
      text.push_str(&format!("\nNotes:\n{}\n", self.notes));
    }
    if !self.tags.is_empty() {
      text.push_str(&format!("\nTags: {}\n", self.tags.join(", ")));
    }
    if !self.guest_tags.is_empty() {
      text.push_str(&format!("\nGuests: {}\n", self.guest_tags.join(", ")));
    }

    text
  }
}

impl Entity for Mix {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind() -> EntityKind {
    EntityKind::Mixes
  }
}

/// A profile partitions mixes. At most one profile is active locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Profile {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind() -> EntityKind {
    EntityKind::Profiles
  }
}

fn clamp_strength(raw: i64) -> u8 {
  raw.clamp(MIN_STRENGTH as i64, MAX_STRENGTH as i64) as u8
}

fn unique(values: impl Iterator<Item = String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for value in values {
    if !out.contains(&value) {
      out.push(value);
    }
  }
  out
}

fn deserialize_strength<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = i64::deserialize(deserializer)?;
  Ok(clamp_strength(raw))
}

fn deserialize_unique<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(unique(v.into_iter()))
}
