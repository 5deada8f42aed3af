//! Tool bridge: applies batches of checklist intents from the automated
//! assistant.
//!
//! Every update in a batch is independent. A failing item is recorded and the
//! rest of the batch still applies; an assignee that does not resolve to the
//! crew is written anyway and reported as a warning.

use std::{fmt::Write as _, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Classify, ErrorKind,
  crew::Resolution,
  item::{ChecklistItem, ItemUpsert, validate_item_name},
  store::ChecklistStore,
  trip::{Trip, TripMetadata},
  user::Principal,
};

// ─── Wire types ──────────────────────────────────────────────────────────────

/// One intent from the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
  pub item_name:         String,
  /// `false` when the assistant is only assigning the item.
  #[serde(default)]
  pub is_checked:        bool,
  #[serde(default)]
  pub location:          Option<String>,
  #[serde(default)]
  pub photo_artifact_id: Option<Uuid>,
  #[serde(default)]
  pub assigned_to_name:  Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
  /// Every item applied and every assignee resolved.
  Success,
  /// Every item applied, at least one assignee is not in the crew.
  Warning,
  /// At least one item failed outright.
  PartialSuccess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
  pub item_name: String,
  pub reason:    String,
  /// `true` when the input itself was rejected rather than the store.
  pub invalid:   bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemWarning {
  pub item_name: String,
  pub message:   String,
}

/// Aggregate outcome of [`ToolBridge::apply_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
  pub status:   BatchStatus,
  /// Names of the items that were written, in batch order.
  pub applied:  Vec<String>,
  pub failed:   Vec<ItemFailure>,
  pub warnings: Vec<ItemWarning>,
  /// Human readable summary for the assistant to relay.
  pub message:  String,
}

impl BatchResult {
  fn new(applied: Vec<String>, failed: Vec<ItemFailure>, warnings: Vec<ItemWarning>) -> Self {
    let status = if !failed.is_empty() {
      BatchStatus::PartialSuccess
    } else if !warnings.is_empty() {
      BatchStatus::Warning
    } else {
      BatchStatus::Success
    };

    let mut message = format!("Updated {} items: {}.", applied.len(), applied.join(", "));
    if !failed.is_empty() {
      let list: Vec<String> = failed
        .iter()
        .map(|f| format!("{}: {}", f.item_name, f.reason))
        .collect();
      let _ = write!(message, " Failed items: {}.", list.join(", "));
    }
    if !warnings.is_empty() {
      let list: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
      let _ = write!(message, " Warnings: {}.", list.join(", "));
    }

    Self { status, applied, failed, warnings, message }
  }
}

// ─── Bridge ──────────────────────────────────────────────────────────────────

/// The acting user, resolved once per batch.
#[derive(Debug, Clone, Default)]
struct Actor {
  user_id:      Option<String>,
  /// Registered users only; guests never act as an assignment fallback.
  registered:   Option<String>,
  display_name: Option<String>,
}

pub struct ToolBridge<S> {
  store: Arc<S>,
}

impl<S> Clone for ToolBridge<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ChecklistStore> ToolBridge<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Map the assistant's session id to a trip.
  pub async fn trip_for_session(&self, session_id: &str) -> Result<Trip, S::Error> {
    self
      .store
      .get_trip_by_session(session_id.to_owned())
      .await?
      .ok_or_else(|| crate::Error::SessionNotFound(session_id.to_owned()).into())
  }

  /// Apply every update in order; never aborts early.
  pub async fn apply_batch(
    &self,
    trip_id: Uuid,
    principal: &Principal,
    updates: Vec<ItemUpdate>,
  ) -> Result<BatchResult, S::Error> {
    info!(%trip_id, count = updates.len(), "applying checklist batch");

    let actor = self.actor(principal).await?;

    let mut applied = Vec::new();
    let mut failed = Vec::new();
    let mut warnings = Vec::new();

    for update in updates {
      let label = update.item_name.trim().to_owned();
      match self.apply_one(trip_id, &actor, update).await {
        Ok((item, warning)) => {
          if let Some(message) = warning {
            warnings.push(ItemWarning { item_name: item.name.clone(), message });
          }
          applied.push(item.name);
        }
        Err(e) => {
          warn!(%trip_id, item = %label, error = %e, "batch item failed");
          failed.push(ItemFailure {
            item_name: label,
            reason:    e.to_string(),
            invalid:   e.kind() == ErrorKind::Validation,
          });
        }
      }
    }

    Ok(BatchResult::new(applied, failed, warnings))
  }

  /// Update boat or captain name only. Blank strings count as absent.
  pub async fn update_metadata(
    &self,
    trip_id: Uuid,
    metadata: TripMetadata,
  ) -> Result<Trip, S::Error> {
    let metadata = TripMetadata {
      boat_name:    non_blank(metadata.boat_name),
      captain_name: non_blank(metadata.captain_name),
    };
    info!(%trip_id, ?metadata, "updating trip metadata");
    self.store.update_trip_metadata(trip_id, metadata).await
  }

  pub async fn crew_list(&self, trip_id: Uuid) -> Result<Vec<String>, S::Error> {
    self.store.crew_names(trip_id).await
  }

  pub async fn checklist_status(&self, trip_id: Uuid) -> Result<Vec<ChecklistItem>, S::Error> {
    self.store.get_report(trip_id).await
  }

  async fn actor(&self, principal: &Principal) -> Result<Actor, S::Error> {
    Ok(match principal {
      Principal::Anonymous => Actor::default(),
      Principal::Guest { name } => Actor {
        user_id:      principal.acting_user_id(),
        registered:   None,
        display_name: Some(name.clone()),
      },
      Principal::Registered { user_id } => {
        let name = self
          .store
          .get_user(user_id.clone())
          .await?
          .and_then(|u| u.name)
          .filter(|n| !n.trim().is_empty());
        Actor {
          user_id:      Some(user_id.clone()),
          registered:   Some(user_id.clone()),
          display_name: name,
        }
      }
    })
  }

  async fn apply_one(
    &self,
    trip_id: Uuid,
    actor: &Actor,
    update: ItemUpdate,
  ) -> Result<(ChecklistItem, Option<String>), S::Error> {
    let name = validate_item_name(&update.item_name)?.to_owned();

    let mut input = ItemUpsert::new(trip_id, name, update.is_checked);
    input.location = update.location;
    input.photo_ref = update.photo_artifact_id;
    input.acting_user_id = actor.user_id.clone();
    input.completed_by_name = actor.display_name.clone();

    let mut warning = None;
    if let Some(query) = non_blank(update.assigned_to_name) {
      let resolution = self.resolve(trip_id, actor, &query).await?;
      if resolution.matched {
        input.assigned_user_id = self.assignee_id(actor, &resolution.name).await?;
      } else {
        warning = Some(format!(
          "{}: assigned to {:?}, who is not in the crew list",
          input.name, resolution.name
        ));
      }
      input.assigned_name = Some(resolution.name);
    }

    let item = self.store.upsert_item(input).await?;
    Ok((item, warning))
  }

  /// Crew match first, then the actor's own registered name.
  async fn resolve(&self, trip_id: Uuid, actor: &Actor, query: &str) -> Result<Resolution, S::Error> {
    let resolution = self.store.resolve_assignee(trip_id, query.to_owned()).await?;
    if resolution.matched || actor.registered.is_none() {
      return Ok(resolution);
    }
    match actor.display_name.as_deref() {
      Some(own) if own.eq_ignore_ascii_case(query.trim()) => {
        Ok(Resolution { name: own.to_owned(), matched: true })
      }
      _ => Ok(resolution),
    }
  }

  /// The registered user behind a resolved crew name, if there is one.
  async fn assignee_id(&self, actor: &Actor, name: &str) -> Result<Option<String>, S::Error> {
    if let Some(user) = self.store.find_user_by_name(name.to_owned()).await? {
      return Ok(Some(user.user_id));
    }
    let is_actor = actor
      .display_name
      .as_deref()
      .is_some_and(|own| own.eq_ignore_ascii_case(name));
    Ok(if is_actor { actor.registered.clone() } else { None })
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn failure(name: &str) -> ItemFailure {
    ItemFailure { item_name: name.into(), reason: "trip not found".into(), invalid: false }
  }

  fn warning(name: &str) -> ItemWarning {
    ItemWarning { item_name: name.into(), message: format!("{name}: not in crew") }
  }

  #[test]
  fn all_applied_is_success() {
    let r = BatchResult::new(vec!["Oil".into(), "Flares".into()], vec![], vec![]);
    assert_eq!(r.status, BatchStatus::Success);
    assert_eq!(r.message, "Updated 2 items: Oil, Flares.");
  }

  #[test]
  fn unmatched_assignee_is_warning() {
    let r = BatchResult::new(vec!["Oil".into()], vec![], vec![warning("Oil")]);
    assert_eq!(r.status, BatchStatus::Warning);
    assert!(r.message.ends_with("Warnings: Oil: not in crew."));
  }

  #[test]
  fn any_failure_is_partial_success() {
    let r = BatchResult::new(vec!["Oil".into()], vec![failure("Flares")], vec![warning("Oil")]);
    assert_eq!(r.status, BatchStatus::PartialSuccess);
    assert!(r.message.contains("Failed items: Flares: trip not found."));
  }

  #[test]
  fn status_serialises_snake_case() {
    assert_eq!(
      serde_json::to_string(&BatchStatus::PartialSuccess).unwrap(),
      "\"partial_success\""
    );
  }

  #[test]
  fn updates_accept_minimal_json() {
    let u: ItemUpdate = serde_json::from_str(r#"{"item_name":"Oil"}"#).unwrap();
    assert!(!u.is_checked);
    assert!(u.assigned_to_name.is_none());
  }
}
