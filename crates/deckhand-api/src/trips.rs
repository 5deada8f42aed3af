//! Handlers for `/trips` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/trips` | Create or join by `session_id`; caller becomes crew |
//! | `GET`    | `/trips` | Trips the caller owns or crews |
//! | `GET`    | `/trips/{id}` | Unified state; optional `?user_id=` |
//! | `DELETE` | `/trips/{id}` | Cascades to items, crew and artifacts |
//! | `PATCH`  | `/trips/{id}/status` | Body: `{"status":"Ready"}` |
//! | `PATCH`  | `/trips/{id}/type` | Body: `{"trip_type":"Returning"}` |
//! | `PATCH`  | `/trips/{id}/metadata` | Body: `{"boat_name":..,"captain_name":..}` |
//! | `GET`    | `/trips/{id}/report` | Items with photos, by category then name |
//! | `GET`    | `/trips/{id}/crew` | Trusted crew names |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use deckhand_core::{
  item::ChecklistItem,
  state::UnifiedState,
  store::ChecklistStore,
  trip::{NewTrip, Trip, TripMetadata, TripStatus, TripType},
  user::{Principal, guest_id},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{ApiState, error::ApiError, principal::Caller};

// ─── Create / join ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub session_id:   String,
  #[serde(default)]
  pub captain_name: Option<String>,
  #[serde(default)]
  pub trip_type:    Option<TripType>,
}

/// `POST /trips`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Json(body): Json<CreateBody>,
) -> Result<Json<Trip>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let trip = state
    .store
    .get_or_create_trip(NewTrip {
      session_id:   body.session_id,
      user_id:      principal.registered_id().map(str::to_owned),
      captain_name: body.captain_name.clone(),
      trip_type:    body.trip_type,
    })
    .await
    .map_err(ApiError::store)?;

  let crew = match &principal {
    Principal::Anonymous => None,
    Principal::Guest { name } => Some((guest_id(name), name.clone())),
    Principal::Registered { user_id } => {
      let user = state
        .store
        .get_user(user_id.clone())
        .await
        .map_err(ApiError::store)?;
      let name = match user {
        Some(u) => u.display_name().to_owned(),
        None => body
          .captain_name
          .filter(|n| !n.trim().is_empty())
          .unwrap_or_else(|| user_id.clone()),
      };
      Some((user_id.clone(), name))
    }
  };
  if let Some((user_id, name)) = crew {
    state
      .store
      .add_crew(trip.trip_id, user_id, name)
      .await
      .map_err(ApiError::store)?;
  }

  info!(trip_id = %trip.trip_id, session_id = %trip.session_id, "trip joined");
  Ok(Json(trip))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /trips`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
) -> Result<Json<Vec<Trip>>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let user_id = principal
    .acting_user_id()
    .ok_or_else(|| ApiError::Unauthorized("caller identity required".into()))?;
  let trips = state
    .store
    .list_user_trips(user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(trips))
}

// ─── Unified state ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StateParams {
  pub user_id: Option<String>,
}

/// `GET /trips/{id}[?user_id=<id>]`
///
/// Assistant session state is merged for `user_id`, defaulting to the
/// registered caller.
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Query(params): Query<StateParams>,
) -> Result<Json<UnifiedState>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let user = params
    .user_id
    .or_else(|| principal.registered_id().map(str::to_owned));
  let snapshot = state
    .aggregator
    .unified_state(id, user.as_deref())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(snapshot))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /trips/{id}`
pub async fn delete_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ChecklistStore + 'static,
{
  state.store.delete_trip(id).await.map_err(ApiError::store)?;
  info!(trip_id = %id, "trip deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Narrow updates ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: TripStatus,
}

/// `PATCH /trips/{id}/status`
pub async fn update_status<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Trip>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let trip = state
    .store
    .update_trip_status(id, body.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(trip))
}

#[derive(Debug, Deserialize)]
pub struct TypeBody {
  pub trip_type: TripType,
}

/// `PATCH /trips/{id}/type`
pub async fn update_type<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<TypeBody>,
) -> Result<Json<Trip>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let trip = state
    .store
    .update_trip_type(id, body.trip_type)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(trip))
}

/// `PATCH /trips/{id}/metadata`
pub async fn update_metadata<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<TripMetadata>,
) -> Result<Json<Trip>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let trip = state
    .bridge
    .update_metadata(id, body)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(trip))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /trips/{id}/report`
pub async fn report<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChecklistItem>>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let items = state.store.get_report(id).await.map_err(ApiError::store)?;
  Ok(Json(items))
}

#[derive(Debug, Serialize)]
pub struct CrewResponse {
  pub crew: Vec<String>,
}

/// `GET /trips/{id}/crew`
pub async fn crew<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CrewResponse>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let crew = state.bridge.crew_list(id).await.map_err(ApiError::store)?;
  Ok(Json(CrewResponse { crew }))
}
