//! Handlers for `/artifacts`. Only metadata is stored; the bytes live behind
//! `storage_ref` in external storage.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use deckhand_core::{
  item::{Artifact, NewArtifact},
  store::ChecklistStore,
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// `POST /artifacts`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewArtifact>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ChecklistStore + 'static,
{
  let artifact = state
    .store
    .create_artifact(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(artifact)))
}

/// `GET /artifacts/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Artifact>, ApiError>
where
  S: ChecklistStore + 'static,
{
  state
    .store
    .get_artifact(id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("artifact {id} not found")))
}
