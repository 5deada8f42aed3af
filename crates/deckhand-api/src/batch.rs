//! Handlers for assistant batches.
//!
//! Per-item failures are reported inside the [`BatchResult`] with a `200`;
//! only a missing trip or a store outage fails the request.

use axum::{
  Json,
  extract::{Path, State},
};
use deckhand_core::{
  bridge::{BatchResult, ItemUpdate},
  store::ChecklistStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError, principal::Caller};

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub updates: Vec<ItemUpdate>,
}

/// `POST /trips/{id}/batch`
pub async fn by_trip<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(trip_id): Path<Uuid>,
  Json(body): Json<BatchBody>,
) -> Result<Json<BatchResult>, ApiError>
where
  S: ChecklistStore + 'static,
{
  // Surface a missing trip as 404 rather than one failure per item.
  state
    .store
    .get_trip(trip_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("trip not found: {trip_id}")))?;

  let result = state
    .bridge
    .apply_batch(trip_id, &principal, body.updates)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(result))
}

/// `POST /sessions/{session_id}/batch`, for callers that only know the
/// session they run in.
pub async fn by_session<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(session_id): Path<String>,
  Json(body): Json<BatchBody>,
) -> Result<Json<BatchResult>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let trip = state
    .bridge
    .trip_for_session(&session_id)
    .await
    .map_err(ApiError::store)?;
  let result = state
    .bridge
    .apply_batch(trip.trip_id, &principal, body.updates)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(result))
}
