//! Unified state: the snapshot clients re-fetch after any change hint.
//!
//! Trip and items are always read fresh from the store. Assistant session
//! state is owned by an external service and merged in as advisory data; it
//! can never override checklist rows.

use std::{future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{item::ChecklistItem, store::ChecklistStore, trip::Trip};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type SessionFuture<'a> =
  Pin<Box<dyn Future<Output = Result<Option<Value>, BoxError>> + Send + 'a>>;

/// Keys of the session blob that would shadow authoritative fields.
const RESERVED_KEYS: [&str; 3] = ["trip", "items", "checklist"];

// ─── Session source ──────────────────────────────────────────────────────────

/// Source of per-user assistant session state.
///
/// Object safe so the server can pick an implementation from configuration.
pub trait SessionStateSource: Send + Sync {
  /// The `state` blob of the session, or `None` when there is no session.
  fn session_state<'a>(&'a self, user_id: &'a str, session_id: &'a str) -> SessionFuture<'a>;
}

/// Used when no session service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessionState;

impl SessionStateSource for NoSessionState {
  fn session_state<'a>(&'a self, _user_id: &'a str, _session_id: &'a str) -> SessionFuture<'a> {
    Box::pin(async { Ok::<Option<Value>, BoxError>(None) })
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedState {
  pub trip:            Trip,
  pub items:           Vec<ChecklistItem>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assistant_state: Option<Value>,
}

pub struct StateAggregator<S> {
  store:    Arc<S>,
  sessions: Arc<dyn SessionStateSource>,
}

impl<S> Clone for StateAggregator<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      sessions: Arc::clone(&self.sessions),
    }
  }
}

impl<S: ChecklistStore> StateAggregator<S> {
  pub fn new(store: Arc<S>, sessions: Arc<dyn SessionStateSource>) -> Self {
    Self { store, sessions }
  }

  /// Build the snapshot. Session lookup failures are logged and the
  /// snapshot is returned without assistant state.
  pub async fn unified_state(
    &self,
    trip_id: Uuid,
    requesting_user: Option<&str>,
  ) -> Result<UnifiedState, S::Error> {
    let trip = self
      .store
      .get_trip(trip_id)
      .await?
      .ok_or(crate::Error::TripNotFound(trip_id))?;
    let items = self.store.get_report(trip_id).await?;

    let assistant_state = match requesting_user.map(str::trim).filter(|u| !u.is_empty()) {
      None => None,
      Some(user) => match self.sessions.session_state(user, &trip.session_id).await {
        Ok(state) => state.and_then(advisory),
        Err(e) => {
          warn!(%trip_id, user, error = %e, "session state unavailable");
          None
        }
      },
    };
    debug!(%trip_id, items = items.len(), merged = assistant_state.is_some(), "unified state built");

    Ok(UnifiedState { trip, items, assistant_state })
  }
}

/// Drop keys that would shadow store data; empty or null blobs become `None`.
fn advisory(state: Value) -> Option<Value> {
  match state {
    Value::Null => None,
    Value::Object(mut map) => {
      for key in RESERVED_KEYS {
        map.remove(key);
      }
      (!map.is_empty()).then_some(Value::Object(map))
    }
    other => Some(other),
  }
}
