//! Pure filtering of the canonical mix set into ready / in-development views.
//!
//! Dimensions are AND-ed together. Within the search dimension a match on
//! name, composition or notes is enough; required tags must all be present.

use std::collections::BTreeSet;

use crate::types::{Mix, MAX_STRENGTH, MIN_STRENGTH};

/// Transient filter state owned by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
  pub search_text: String,
  pub required_tags: BTreeSet<String>,
  pub required_guest_tags: BTreeSet<String>,
  pub min_strength: u8,
  pub max_strength: u8,
}

impl Default for FilterSpec {
  fn default() -> Self {
    Self {
      search_text: String::new(),
      required_tags: BTreeSet::new(),
      required_guest_tags: BTreeSet::new(),
      min_strength: MIN_STRENGTH,
      max_strength: MAX_STRENGTH,
    }
  }
}

impl FilterSpec {
  pub fn toggle_tag(&mut self, tag: &str) {
    toggle(&mut self.required_tags, tag);
  }

  pub fn toggle_guest_tag(&mut self, tag: &str) {
    toggle(&mut self.required_guest_tags, tag);
  }

  pub fn clear(&mut self) {
    *self = Self::default();
  }

  /// Whether a single mix passes every dimension of this spec.
  pub fn matches(&self, mix: &Mix) -> bool {
    self.matches_search(mix)
      && contains_all(&mix.tags, &self.required_tags)
      && contains_all(&mix.guest_tags, &self.required_guest_tags)
      && (self.min_strength..=self.max_strength).contains(&mix.strength)
  }

  fn matches_search(&self, mix: &Mix) -> bool {
    if self.search_text.is_empty() {
      return true;
    }
    let needle = self.search_text.to_lowercase();
    [&mix.name, &mix.composition, &mix.notes]
      .iter()
      .any(|field| field.to_lowercase().contains(&needle))
  }
}

fn toggle(set: &mut BTreeSet<String>, tag: &str) {
  if !set.remove(tag) {
    set.insert(tag.to_string());
  }
}

fn contains_all(tags: &[String], required: &BTreeSet<String>) -> bool {
  required.iter().all(|tag| tags.contains(tag))
}

/// Visible subset, split by development status. Input order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
  /// Finished mixes (`is_in_development == false`)
  pub ready: Vec<Mix>,
  /// Mixes still being worked on
  pub in_development: Vec<Mix>,
}

impl FilteredView {
  pub fn len(&self) -> usize {
    self.ready.len() + self.in_development.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Apply `spec` to `mixes`. Side-effect free; same inputs give the same output.
pub fn apply(mixes: &[Mix], spec: &FilterSpec) -> FilteredView {
  let (in_development, ready) = mixes
    .iter()
    .filter(|mix| spec.matches(mix))
    .cloned()
    .partition(|mix| mix.is_in_development);

  FilteredView {
    ready,
    in_development,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mix(id: &str, name: &str, strength: i64, tags: &[&str], dev: bool) -> Mix {
    let mut m = Mix::new("p1", name);
    m.id = id.to_string();
    m.set_strength(strength);
    m.set_tags(tags.iter().copied());
    m.is_in_development = dev;
    m
  }

  fn sample() -> Vec<Mix> {
    vec![
      mix("1", "Lemon Storm", 7, &["Citrus", "Strong"], false),
      mix("2", "Berry Calm", 3, &["Berry"], true),
      mix("3", "Mint Night", 5, &["Herbal", "Strong"], false),
      mix("4", "Smoky Plum", 10, &["Smoky", "Fruity"], true),
    ]
  }

  fn ids(mixes: &[Mix]) -> Vec<&str> {
    mixes.iter().map(|m| m.id.as_str()).collect()
  }

  #[test]
  fn test_default_spec_only_partitions() {
    let view = apply(&sample(), &FilterSpec::default());
    assert_eq!(ids(&view.ready), vec!["1", "3"]);
    assert_eq!(ids(&view.in_development), vec!["2", "4"]);
  }

  #[test]
  fn test_search_is_case_insensitive_across_fields() {
    let mut mixes = sample();
    mixes[1].notes = "great with LEMON zest".to_string();
    mixes[3].composition = "plum, oak".to_string();

    let spec = FilterSpec {
      search_text: "lemon".to_string(),
      ..Default::default()
    };
    let view = apply(&mixes, &spec);
    assert_eq!(ids(&view.ready), vec!["1"]);
    assert_eq!(ids(&view.in_development), vec!["2"]);

    let spec = FilterSpec {
      search_text: "OAK".to_string(),
      ..Default::default()
    };
    assert_eq!(ids(&apply(&mixes, &spec).in_development), vec!["4"]);
  }

  #[test]
  fn test_required_tags_use_intersection() {
    let mut spec = FilterSpec::default();
    spec.toggle_tag("Strong");
    spec.toggle_tag("Citrus");

    let view = apply(&sample(), &spec);
    assert_eq!(ids(&view.ready), vec!["1"]);
    assert!(view.in_development.is_empty());
  }

  #[test]
  fn test_required_guest_tags_use_intersection() {
    let mut mixes = sample();
    mixes[0].set_guest_tags(["Ann", "Bob"]);
    mixes[2].set_guest_tags(["Ann"]);

    let mut spec = FilterSpec::default();
    spec.toggle_guest_tag("Ann");
    spec.toggle_guest_tag("Bob");

    assert_eq!(ids(&apply(&mixes, &spec).ready), vec!["1"]);
  }

  #[test]
  fn test_strength_bounds_are_inclusive() {
    let spec = FilterSpec {
      min_strength: 5,
      max_strength: 7,
      ..Default::default()
    };
    let view = apply(&sample(), &spec);
    assert_eq!(ids(&view.ready), vec!["1", "3"]);
    assert!(view.in_development.is_empty());
  }

  #[test]
  fn test_reapplying_is_idempotent() {
    let mut spec = FilterSpec {
      search_text: "m".to_string(),
      min_strength: 3,
      ..Default::default()
    };
    spec.toggle_tag("Strong");

    let first = apply(&sample(), &spec);
    let flattened: Vec<Mix> = first
      .ready
      .iter()
      .chain(first.in_development.iter())
      .cloned()
      .collect();
    let second = apply(&flattened, &spec);

    assert_eq!(first, second);
  }

  #[test]
  fn test_toggle_and_clear() {
    let mut spec = FilterSpec::default();
    spec.toggle_tag("Sweet");
    assert!(spec.required_tags.contains("Sweet"));
    spec.toggle_tag("Sweet");
    assert!(spec.required_tags.is_empty());

    spec.search_text = "x".to_string();
    spec.min_strength = 4;
    spec.clear();
    assert_eq!(spec, FilterSpec::default());
  }
}
