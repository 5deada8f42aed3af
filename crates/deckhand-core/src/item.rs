//! Checklist items and the artifacts attached to them.
//!
//! Items are created lazily: the first update (or photo attachment) for a
//! name inserts the row, every later one merges into it. `(trip_id, name)` is
//! unique, so concurrent writers for the same name always land on one row.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Category assigned to items that are created without one.
pub const DEFAULT_CATEGORY: &str = "General";

/// Longest item name accepted from callers.
pub const MAX_ITEM_NAME_LEN: usize = 200;

// ─── Item type ───────────────────────────────────────────────────────────────

/// How the client renders the item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
  #[default]
  Checkbox,
  Count,
  Text,
  Number,
}

impl ItemType {
  pub fn as_str(self) -> &'static str {
    match self {
      ItemType::Checkbox => "checkbox",
      ItemType::Count => "count",
      ItemType::Text => "text",
      ItemType::Number => "number",
    }
  }
}

impl fmt::Display for ItemType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ItemType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "checkbox" => Ok(ItemType::Checkbox),
      "count" => Ok(ItemType::Count),
      "text" => Ok(ItemType::Text),
      "number" => Ok(ItemType::Number),
      other => Err(Error::Validation(format!("unknown item type: {other:?}"))),
    }
  }
}

// ─── Artifact ────────────────────────────────────────────────────────────────

/// Metadata for an uploaded file. The bytes live in external storage; only
/// the opaque `storage_ref` is kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  pub artifact_id: Uuid,
  pub trip_id:     Option<Uuid>,
  /// Set once the artifact is linked; uploads may precede the item.
  pub item_id:     Option<Uuid>,
  pub filename:    String,
  pub mime_type:   Option<String>,
  pub storage_ref: String,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArtifact {
  pub trip_id:     Option<Uuid>,
  pub filename:    String,
  pub mime_type:   Option<String>,
  pub storage_ref: String,
}

// ─── Item ────────────────────────────────────────────────────────────────────

/// One named task row scoped to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
  pub item_id:                Uuid,
  pub trip_id:                Uuid,
  pub category:               String,
  pub name:                   String,
  pub item_type:              ItemType,
  pub checked:                bool,
  pub count_value:            i64,
  pub location:               Option<String>,
  pub flagged_issue:          Option<String>,
  pub completed_by_user_id:   Option<String>,
  pub completed_by_name:      Option<String>,
  /// Current name of the registered user in `completed_by_user_id`, filled
  /// by report reads only.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed_by_user_name: Option<String>,
  pub assigned_to_user_id:    Option<String>,
  pub assigned_to_name:       Option<String>,
  pub updated_at:             DateTime<Utc>,
  /// Linked artifacts, filled by report reads only.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub photos:                 Vec<Artifact>,
}

/// Input for [`ChecklistStore::upsert_item`](crate::store::ChecklistStore::upsert_item).
///
/// Merge policy when the row already exists:
/// - `checked` and the completion attribution always take the incoming value;
///   attribution is only recorded while `checked` is true.
/// - `location` is kept unless the incoming value is non-empty.
/// - the assignment pair is kept unless either assignment field is supplied.
/// - `item_type`, `count_value` and `flagged_issue` are kept when `None`.
/// - `category` only applies when the row is created.
#[derive(Debug, Clone, Default)]
pub struct ItemUpsert {
  pub trip_id:           Uuid,
  pub name:              String,
  pub checked:           bool,
  pub location:          Option<String>,
  /// Artifact id to link to the item inside the same transaction.
  pub photo_ref:         Option<Uuid>,
  pub acting_user_id:    Option<String>,
  pub completed_by_name: Option<String>,
  pub assigned_user_id:  Option<String>,
  pub assigned_name:     Option<String>,
  pub category:          Option<String>,
  pub item_type:         Option<ItemType>,
  pub count_value:       Option<i64>,
  pub flagged_issue:     Option<String>,
}

impl ItemUpsert {
  pub fn new(trip_id: Uuid, name: impl Into<String>, checked: bool) -> Self {
    Self {
      trip_id,
      name: name.into(),
      checked,
      ..Self::default()
    }
  }

  /// Attribution actually written: cleared when the item is unchecked.
  pub fn completion(&self) -> (Option<&str>, Option<&str>) {
    if self.checked {
      (
        self.acting_user_id.as_deref().filter(|s| !s.is_empty()),
        self.completed_by_name.as_deref().filter(|s| !s.is_empty()),
      )
    } else {
      (None, None)
    }
  }

  /// Location to write; an empty string is treated as "not supplied".
  pub fn location(&self) -> Option<&str> {
    self.location.as_deref().filter(|s| !s.trim().is_empty())
  }
}

/// Trim and bound-check an item name supplied by a caller.
pub fn validate_item_name(name: &str) -> crate::Result<&str> {
  let trimmed = name.trim();
  if trimmed.is_empty() {
    return Err(Error::Validation("item name must not be empty".into()));
  }
  if trimmed.chars().count() > MAX_ITEM_NAME_LEN {
    return Err(Error::Validation(format!(
      "item name longer than {MAX_ITEM_NAME_LEN} characters"
    )));
  }
  Ok(trimmed)
}
