//! `PUT /users/{id}`: the auth layer registers or renames a user here.

use axum::{
  Json,
  extract::{Path, State},
};
use deckhand_core::{store::ChecklistStore, user::User};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct UserBody {
  #[serde(default)]
  pub name: Option<String>,
}

pub async fn put<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<String>,
  Json(body): Json<UserBody>,
) -> Result<Json<User>, ApiError>
where
  S: ChecklistStore + 'static,
{
  let user = state
    .store
    .put_user(user_id, body.name)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(user))
}
