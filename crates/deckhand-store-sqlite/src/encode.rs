//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings (microseconds, `Z`), so they
//! sort lexically. UUIDs are hyphenated lowercase strings. Booleans are
//! `INTEGER` 0/1.

use chrono::{DateTime, SecondsFormat, Utc};
use deckhand_core::{
  item::{Artifact, ChecklistItem, ItemType},
  trip::{Trip, TripStatus, TripType},
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

fn decode_enum<T: std::str::FromStr>(column: &'static str, value: String) -> Result<T> {
  value
    .parse()
    .map_err(|_| Error::Corrupt { column, value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawUser::from_row`].
pub const USER_COLUMNS: &str = "user_id, name, created_at";

pub struct RawUser {
  pub user_id:    String,
  pub name:       Option<String>,
  pub created_at: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      name:       row.get(1)?,
      created_at: row.get(2)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    self.user_id,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawTrip::from_row`].
pub const TRIP_COLUMNS: &str =
  "trip_id, session_id, user_id, boat_name, captain_name, trip_type, status, created_at";

pub struct RawTrip {
  pub trip_id:      String,
  pub session_id:   String,
  pub user_id:      Option<String>,
  pub boat_name:    Option<String>,
  pub captain_name: Option<String>,
  pub trip_type:    String,
  pub status:       String,
  pub created_at:   String,
}

impl RawTrip {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      trip_id:      row.get(0)?,
      session_id:   row.get(1)?,
      user_id:      row.get(2)?,
      boat_name:    row.get(3)?,
      captain_name: row.get(4)?,
      trip_type:    row.get(5)?,
      status:       row.get(6)?,
      created_at:   row.get(7)?,
    })
  }

  pub fn into_trip(self) -> Result<Trip> {
    Ok(Trip {
      trip_id:      decode_uuid(&self.trip_id)?,
      session_id:   self.session_id,
      user_id:      self.user_id,
      boat_name:    self.boat_name,
      captain_name: self.captain_name,
      trip_type:    decode_enum::<TripType>("trips.trip_type", self.trip_type)?,
      status:       decode_enum::<TripStatus>("trips.status", self.status)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawItem::from_row`]; `i.` is the item alias and
/// the last column is the completing user's current name.
pub const ITEM_COLUMNS: &str = "i.item_id, i.trip_id, i.category, i.name, i.item_type, \
   i.is_checked, i.count_value, i.location_text, i.flagged_issue, \
   i.completed_by_user_id, i.completed_by_name, i.assigned_to_user_id, \
   i.assigned_to_name, i.updated_at, u.name";

pub struct RawItem {
  pub item_id:                String,
  pub trip_id:                String,
  pub category:               String,
  pub name:                   String,
  pub item_type:              String,
  pub is_checked:             bool,
  pub count_value:            i64,
  pub location_text:          Option<String>,
  pub flagged_issue:          Option<String>,
  pub completed_by_user_id:   Option<String>,
  pub completed_by_name:      Option<String>,
  pub assigned_to_user_id:    Option<String>,
  pub assigned_to_name:       Option<String>,
  pub updated_at:             String,
  pub completed_by_user_name: Option<String>,
}

impl RawItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      item_id:                row.get(0)?,
      trip_id:                row.get(1)?,
      category:               row.get(2)?,
      name:                   row.get(3)?,
      item_type:              row.get(4)?,
      is_checked:             row.get(5)?,
      count_value:            row.get(6)?,
      location_text:          row.get(7)?,
      flagged_issue:          row.get(8)?,
      completed_by_user_id:   row.get(9)?,
      completed_by_name:      row.get(10)?,
      assigned_to_user_id:    row.get(11)?,
      assigned_to_name:       row.get(12)?,
      updated_at:             row.get(13)?,
      completed_by_user_name: row.get(14)?,
    })
  }

  pub fn into_item(self) -> Result<ChecklistItem> {
    Ok(ChecklistItem {
      item_id:                decode_uuid(&self.item_id)?,
      trip_id:                decode_uuid(&self.trip_id)?,
      category:               self.category,
      name:                   self.name,
      item_type:              decode_enum::<ItemType>("checklist_items.item_type", self.item_type)?,
      checked:                self.is_checked,
      count_value:            self.count_value,
      location:               self.location_text,
      flagged_issue:          self.flagged_issue,
      completed_by_user_id:   self.completed_by_user_id,
      completed_by_name:      self.completed_by_name,
      completed_by_user_name: self.completed_by_user_name,
      assigned_to_user_id:    self.assigned_to_user_id,
      assigned_to_name:       self.assigned_to_name,
      updated_at:             decode_dt(&self.updated_at)?,
      photos:                 Vec::new(),
    })
  }
}

/// Column list matching [`RawArtifact::from_row`].
pub const ARTIFACT_COLUMNS: &str =
  "artifact_id, trip_id, item_id, filename, mime_type, storage_ref, created_at";

pub struct RawArtifact {
  pub artifact_id: String,
  pub trip_id:     Option<String>,
  pub item_id:     Option<String>,
  pub filename:    String,
  pub mime_type:   Option<String>,
  pub storage_ref: String,
  pub created_at:  String,
}

impl RawArtifact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      artifact_id: row.get(0)?,
      trip_id:     row.get(1)?,
      item_id:     row.get(2)?,
      filename:    row.get(3)?,
      mime_type:   row.get(4)?,
      storage_ref: row.get(5)?,
      created_at:  row.get(6)?,
    })
  }

  pub fn into_artifact(self) -> Result<Artifact> {
    Ok(Artifact {
      artifact_id: decode_uuid(&self.artifact_id)?,
      trip_id:     decode_opt_uuid(self.trip_id)?,
      item_id:     decode_opt_uuid(self.item_id)?,
      filename:    self.filename,
      mime_type:   self.mime_type,
      storage_ref: self.storage_ref,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
