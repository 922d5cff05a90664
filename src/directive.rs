// Copyright 2020-2024 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// A tree of disclosure markers mirroring the shape of a claims tree.
///
/// At each position a boolean leaf of `true` hides the corresponding object
/// entry or array element behind a digest; a map recurses into an object by
/// key; a vector recurses into an array positionally. Keys and positions the
/// directive does not mention are left untouched.
///
/// The type deserializes from plain JSON, e.g.
/// `{"given_name": true, "nationalities": [true, false, true]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisclosureDirective {
  /// Leaf marker: `true` conceals the entry or element.
  Mark(bool),
  /// Per-key sub-directives for an object.
  Entries(IndexMap<String, DisclosureDirective>),
  /// Positional sub-directives for an array.
  Elements(Vec<DisclosureDirective>),
}

impl DisclosureDirective {
  /// A directive concealing nothing.
  pub fn none() -> Self {
    Self::Mark(false)
  }

  /// A leaf marker concealing the value at its position.
  pub fn hide() -> Self {
    Self::Mark(true)
  }

  pub(crate) fn is_hidden(&self) -> bool {
    matches!(self, Self::Mark(true))
  }

  pub(crate) fn entry(&self, key: &str) -> Option<&Self> {
    match self {
      Self::Entries(entries) => entries.get(key),
      _ => None,
    }
  }

  pub(crate) fn element(&self, index: usize) -> Option<&Self> {
    match self {
      Self::Elements(elements) => elements.get(index),
      _ => None,
    }
  }
}

impl Default for DisclosureDirective {
  fn default() -> Self {
    Self::none()
  }
}
