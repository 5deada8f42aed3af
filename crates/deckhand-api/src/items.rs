//! Handlers for single-item writes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/trips/{id}/items/{name}` | Upsert one item by name |
//! | `POST` | `/trips/{id}/items/{name}/photo` | Body: `{"artifact_id":".."}`; creates the item checked |

use axum::{
  Json,
  extract::{Path, State},
};
use deckhand_core::{
  item::{ChecklistItem, ItemType, ItemUpsert},
  store::ChecklistStore,
  user::Principal,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError, principal::Caller};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemBody {
  pub is_checked:          bool,
  pub location:            Option<String>,
  /// Free-form value for text and number items; wins over `location`.
  pub value:               Option<String>,
  pub photo_artifact_id:   Option<Uuid>,
  pub completed_by_name:   Option<String>,
  pub assigned_to_user_id: Option<String>,
  pub assigned_to_name:    Option<String>,
  pub category:            Option<String>,
  pub item_type:           Option<ItemType>,
  pub count_value:         Option<i64>,
  pub flagged_issue:       Option<String>,
}

/// The name recorded as completer when the client did not send one.
async fn caller_name<S>(state: &ApiState<S>, principal: &Principal) -> Result<Option<String>, ApiError>
where
  S: ChecklistStore + 'static,
{
  Ok(match principal {
    Principal::Anonymous => None,
    Principal::Guest { name } => Some(name.clone()),
    Principal::Registered { user_id } => state
      .store
      .get_user(user_id.clone())
      .await
      .map_err(ApiError::store)?
      .map(|u| u.display_name().to_owned()),
  })
}

/// `PUT /trips/{id}/items/{name}`
pub async fn upsert<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path((trip_id, name)): Path<(Uuid, String)>,
  Json(body): Json<ItemBody>,
) -> Result<Json<ChecklistItem>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let completed_by_name = match body.completed_by_name.filter(|n| !n.trim().is_empty()) {
    Some(n) => Some(n),
    None => caller_name(&state, &principal).await?,
  };
  let location = body
    .value
    .filter(|v| !v.is_empty())
    .or(body.location);

  let item = state
    .store
    .upsert_item(ItemUpsert {
      trip_id,
      name,
      checked: body.is_checked,
      location,
      photo_ref: body.photo_artifact_id,
      acting_user_id: principal.acting_user_id(),
      completed_by_name,
      assigned_user_id: body.assigned_to_user_id,
      assigned_name: body.assigned_to_name,
      category: body.category,
      item_type: body.item_type,
      count_value: body.count_value,
      flagged_issue: body.flagged_issue,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(item))
}

#[derive(Debug, Deserialize)]
pub struct PhotoBody {
  pub artifact_id: Uuid,
}

/// `POST /trips/{id}/items/{name}/photo`
pub async fn attach_photo<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path((trip_id, name)): Path<(Uuid, String)>,
  Json(body): Json<PhotoBody>,
) -> Result<Json<ChecklistItem>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let item = state
    .store
    .attach_photo(trip_id, name, body.artifact_id, principal.acting_user_id())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(item))
}
