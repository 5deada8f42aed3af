//! JSON REST API for Deckhand.
//!
//! Exposes an axum [`Router`] backed by any
//! [`deckhand_core::store::ChecklistStore`]. Authentication happens in front
//! of this router; the acting identity arrives in the `x-user-id` and
//! `x-guest-name` headers (see [`principal`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", deckhand_api::api_router(ApiState::new(store.clone(), sessions)))
//! ```

pub mod artifacts;
pub mod batch;
pub mod error;
pub mod items;
pub mod principal;
pub mod trips;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use deckhand_core::{
  bridge::ToolBridge,
  state::{SessionStateSource, StateAggregator},
  store::ChecklistStore,
};

pub use error::ApiError;
pub use principal::Caller;

/// Shared state for every handler.
pub struct ApiState<S> {
  pub store:      Arc<S>,
  pub bridge:     ToolBridge<S>,
  pub aggregator: StateAggregator<S>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      bridge:     self.bridge.clone(),
      aggregator: self.aggregator.clone(),
    }
  }
}

impl<S: ChecklistStore> ApiState<S> {
  pub fn new(store: Arc<S>, sessions: Arc<dyn SessionStateSource>) -> Self {
    Self {
      bridge: ToolBridge::new(Arc::clone(&store)),
      aggregator: StateAggregator::new(Arc::clone(&store), sessions),
      store,
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: ChecklistStore + 'static,
{
  Router::new()
    // Trips
    .route("/trips", get(trips::list::<S>).post(trips::create::<S>))
    .route("/trips/{id}", get(trips::get_one::<S>).delete(trips::delete_one::<S>))
    .route("/trips/{id}/status", patch(trips::update_status::<S>))
    .route("/trips/{id}/type", patch(trips::update_type::<S>))
    .route("/trips/{id}/metadata", patch(trips::update_metadata::<S>))
    .route("/trips/{id}/report", get(trips::report::<S>))
    .route("/trips/{id}/crew", get(trips::crew::<S>))
    // Items
    .route("/trips/{id}/items/{name}", put(items::upsert::<S>))
    .route("/trips/{id}/items/{name}/photo", post(items::attach_photo::<S>))
    // Assistant batches
    .route("/trips/{id}/batch", post(batch::by_trip::<S>))
    .route("/sessions/{session_id}/batch", post(batch::by_session::<S>))
    // Artifacts
    .route("/artifacts", post(artifacts::create::<S>))
    .route("/artifacts/{id}", get(artifacts::get_one::<S>))
    // Users
    .route("/users/{id}", put(users::put::<S>))
    .with_state(state)
}
