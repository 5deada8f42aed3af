//! Change events emitted by the storage layer.
//!
//! The storage change feed produces loosely typed JSON, shaped by whichever
//! table changed. [`ChangeEvent::parse`] validates it into a small tagged type
//! at the listener boundary. Events are hints ("something on this trip
//! changed, re-fetch"), never authoritative data: an event that would exceed
//! the size budget is replaced by a truncated marker without `data`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, trip::channel_name};

/// Upper bound for an encoded event, matching the payload ceiling of common
/// database notification channels.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 8000;

/// One entry read from a change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
  /// Position in the feed; strictly increasing.
  pub seq:     i64,
  pub payload: String,
}

// ─── Table / action ──────────────────────────────────────────────────────────

/// The table a change originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Table {
  Trip,
  ChecklistItem,
  Artifact,
  /// A table this crate has no dedicated handling for; still forwarded.
  Other(String),
}

impl Table {
  pub fn as_str(&self) -> &str {
    match self {
      Table::Trip => "trip",
      Table::ChecklistItem => "checklist_item",
      Table::Artifact => "artifact",
      Table::Other(name) => name,
    }
  }
}

impl From<&str> for Table {
  fn from(s: &str) -> Self {
    match s {
      "trip" => Table::Trip,
      "checklist_item" => Table::ChecklistItem,
      "artifact" => Table::Artifact,
      other => Table::Other(other.to_owned()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Insert,
  Update,
  Delete,
}

impl Action {
  pub fn as_str(self) -> &'static str {
    match self {
      Action::Insert => "INSERT",
      Action::Update => "UPDATE",
      Action::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Action {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_uppercase().as_str() {
      "INSERT" => Ok(Action::Insert),
      "UPDATE" => Ok(Action::Update),
      "DELETE" => Ok(Action::Delete),
      _ => Err(Error::Validation(format!("unknown change action: {s:?}"))),
    }
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A validated row-level change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
  pub table:   Table,
  pub action:  Action,
  /// Absent for rows that do not belong to a trip (e.g. an unlinked upload).
  pub trip_id: Option<String>,
  pub data:    Option<Map<String, Value>>,
}

/// Shape accepted from the feed, before validation.
#[derive(Deserialize)]
struct RawEvent {
  table:   String,
  action:  String,
  #[serde(default)]
  data:    Value,
  #[serde(default)]
  trip_id: Value,
}

/// Shape published to subscribers.
#[derive(Serialize)]
struct WireEvent<'a> {
  table:     &'a str,
  action:    &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  data:      Option<&'a Map<String, Value>>,
  trip_id:   &'a str,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  truncated: bool,
}

/// An event ready for publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
  pub channel:   String,
  pub bytes:     Vec<u8>,
  pub truncated: bool,
}

impl ChangeEvent {
  /// Validate a raw feed payload.
  pub fn parse(payload: &str) -> Result<Self> {
    let raw: RawEvent = serde_json::from_str(payload)?;

    let table = raw.table.trim();
    if table.is_empty() {
      return Err(Error::Validation("change event without table".into()));
    }
    let action = raw.action.parse()?;

    let trip_id = match raw.trip_id {
      Value::String(s) if !s.trim().is_empty() => Some(s),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    };

    let data = match raw.data {
      Value::Object(map) => Some(map),
      Value::Null => None,
      other => {
        return Err(Error::Validation(format!(
          "change event data must be an object, got {other}"
        )));
      }
    };

    Ok(Self { table: Table::from(table), action, trip_id, data })
  }

  /// The channel this event belongs on, or `None` when it carries no trip.
  pub fn channel(&self) -> Option<String> { self.trip_id.as_deref().map(channel_name) }

  /// Serialise for publication. When the full event would exceed
  /// `max_bytes`, a `{table, action, trip_id, truncated: true}` marker is
  /// produced instead; `data` is never partially emitted.
  pub fn encode(&self, max_bytes: usize) -> Result<Encoded> {
    let trip_id = self
      .trip_id
      .as_deref()
      .ok_or_else(|| Error::Validation("change event has no trip id".into()))?;

    let mut wire = WireEvent {
      table: self.table.as_str(),
      action: self.action.as_str(),
      data: self.data.as_ref(),
      trip_id,
      truncated: false,
    };

    let bytes = serde_json::to_vec(&wire)?;
    if bytes.len() <= max_bytes {
      return Ok(Encoded { channel: channel_name(trip_id), bytes, truncated: false });
    }

    wire.data = None;
    wire.truncated = true;
    Ok(Encoded {
      channel:   channel_name(trip_id),
      bytes:     serde_json::to_vec(&wire)?,
      truncated: true,
    })
  }
}
