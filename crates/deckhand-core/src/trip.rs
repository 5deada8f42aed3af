//! Trip — one checklist session, keyed by an externally issued session id.
//!
//! Exactly one trip exists per session id; joining an existing session returns
//! the same trip. Deleting a trip removes its items, crew and artifacts.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Whether the crew is heading out or coming back in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripType {
  #[default]
  Departing,
  Returning,
}

/// Lifecycle of a trip. New trips start as [`TripStatus::Draft`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStatus {
  #[default]
  Draft,
  Ready,
  Completed,
  Cancelled,
}

impl TripType {
  pub fn as_str(self) -> &'static str {
    match self {
      TripType::Departing => "Departing",
      TripType::Returning => "Returning",
    }
  }
}

impl TripStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      TripStatus::Draft => "Draft",
      TripStatus::Ready => "Ready",
      TripStatus::Completed => "Completed",
      TripStatus::Cancelled => "Cancelled",
    }
  }
}

impl fmt::Display for TripType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for TripStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TripType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Departing" => Ok(TripType::Departing),
      "Returning" => Ok(TripType::Returning),
      other => Err(Error::Validation(format!("unknown trip type: {other:?}"))),
    }
  }
}

impl FromStr for TripStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Draft" => Ok(TripStatus::Draft),
      "Ready" => Ok(TripStatus::Ready),
      "Completed" => Ok(TripStatus::Completed),
      "Cancelled" => Ok(TripStatus::Cancelled),
      other => Err(Error::Validation(format!("unknown trip status: {other:?}"))),
    }
  }
}

/// A persisted trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
  pub trip_id:      Uuid,
  /// The external session id the trip was created for. Unique.
  pub session_id:   String,
  /// Registered user who owns the trip, if any.
  pub user_id:      Option<String>,
  pub boat_name:    Option<String>,
  pub captain_name: Option<String>,
  pub trip_type:    TripType,
  pub status:       TripStatus,
  pub created_at:   DateTime<Utc>,
}

impl Trip {
  /// The pub/sub channel carrying change hints for this trip.
  pub fn channel(&self) -> String { channel_name(self.trip_id) }
}

/// Channel names are `trip:{id}`; ids are opaque so no escaping is needed.
pub const CHANNEL_PREFIX: &str = "trip:";

pub fn channel_name(trip_id: impl fmt::Display) -> String {
  format!("{CHANNEL_PREFIX}{trip_id}")
}

/// Parse the trip id out of a `trip:{id}` channel name.
pub fn parse_channel(channel: &str) -> Option<Uuid> {
  channel
    .strip_prefix(CHANNEL_PREFIX)
    .and_then(|id| Uuid::parse_str(id).ok())
}

/// Input for [`ChecklistStore::get_or_create_trip`](crate::store::ChecklistStore::get_or_create_trip).
#[derive(Debug, Clone, Default)]
pub struct NewTrip {
  pub session_id:   String,
  /// Registered user creating or joining the trip.
  pub user_id:      Option<String>,
  pub captain_name: Option<String>,
  pub trip_type:    Option<TripType>,
}

/// Narrow metadata update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripMetadata {
  pub boat_name:    Option<String>,
  pub captain_name: Option<String>,
}

impl TripMetadata {
  pub fn is_empty(&self) -> bool { self.boat_name.is_none() && self.captain_name.is_none() }
}
