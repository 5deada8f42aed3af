//! The `ChecklistStore` and `ChangeFeed` traits.
//!
//! Implemented by storage backends (e.g. `deckhand-store-sqlite`). The hub,
//! the tool bridge and the HTTP layer depend on these abstractions, not on a
//! concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Classify,
  crew::Resolution,
  event::RawChange,
  item::{Artifact, ChecklistItem, ItemUpsert, NewArtifact},
  trip::{NewTrip, Trip, TripMetadata, TripStatus, TripType},
  user::User,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The system of record for trips, items, artifacts and users.
///
/// Every mutation runs in a single database transaction; the store never
/// retries. All methods return `Send` futures so the trait can be used from
/// axum handlers and spawned tasks.
pub trait ChecklistStore: Send + Sync {
  type Error: std::error::Error + Classify + From<crate::Error> + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create or rename a registered user.
  fn put_user(
    &self,
    user_id: String,
    name: Option<String>,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Case-insensitive lookup by display name. When several users share a
  /// name, the earliest registered wins.
  fn find_user_by_name(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Trips ─────────────────────────────────────────────────────────────

  /// Return the trip for `input.session_id`, creating it when absent.
  ///
  /// An ownerless trip is claimed by the first registered user who joins.
  fn get_or_create_trip(
    &self,
    input: NewTrip,
  ) -> impl Future<Output = Result<Trip, Self::Error>> + Send + '_;

  fn get_trip(
    &self,
    trip_id: Uuid,
  ) -> impl Future<Output = Result<Option<Trip>, Self::Error>> + Send + '_;

  fn get_trip_by_session(
    &self,
    session_id: String,
  ) -> impl Future<Output = Result<Option<Trip>, Self::Error>> + Send + '_;

  /// Trips owned by or crewed by `user_id`, newest first.
  fn list_user_trips(
    &self,
    user_id: String,
  ) -> impl Future<Output = Result<Vec<Trip>, Self::Error>> + Send + '_;

  fn update_trip_status(
    &self,
    trip_id: Uuid,
    status: TripStatus,
  ) -> impl Future<Output = Result<Trip, Self::Error>> + Send + '_;

  fn update_trip_type(
    &self,
    trip_id: Uuid,
    trip_type: TripType,
  ) -> impl Future<Output = Result<Trip, Self::Error>> + Send + '_;

  /// Fields left as `None` keep their stored value.
  fn update_trip_metadata(
    &self,
    trip_id: Uuid,
    metadata: TripMetadata,
  ) -> impl Future<Output = Result<Trip, Self::Error>> + Send + '_;

  /// Delete a trip together with its items, crew and artifacts.
  fn delete_trip(
    &self,
    trip_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Crew ──────────────────────────────────────────────────────────────

  /// Record that `user_id` joined the trip under `display_name`. Joining
  /// twice updates the display name.
  fn add_crew(
    &self,
    trip_id: Uuid,
    user_id: String,
    display_name: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The trusted crew set, normalised with [`crate::crew::normalize`].
  fn crew_names(
    &self,
    trip_id: Uuid,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Resolve free text against [`crew_names`](Self::crew_names).
  fn resolve_assignee(
    &self,
    trip_id: Uuid,
    name: String,
  ) -> impl Future<Output = Result<Resolution, Self::Error>> + Send + '_ {
    async move {
      let crew = self.crew_names(trip_id).await?;
      Ok(crate::crew::resolve(&crew, &name))
    }
  }

  // ── Items ─────────────────────────────────────────────────────────────

  /// Insert or merge one item, keyed by `(trip_id, name)`. See
  /// [`ItemUpsert`] for the merge policy.
  fn upsert_item(
    &self,
    input: ItemUpsert,
  ) -> impl Future<Output = Result<ChecklistItem, Self::Error>> + Send + '_;

  /// Link an uploaded artifact to an item and mark it checked, creating the
  /// item if it does not exist yet.
  ///
  /// Only the checked flag changes on an existing item. Recorded completion
  /// attribution is kept; `acting_user_id` is recorded only when the item
  /// has none.
  fn attach_photo(
    &self,
    trip_id: Uuid,
    item_name: String,
    artifact_id: Uuid,
    acting_user_id: Option<String>,
  ) -> impl Future<Output = Result<ChecklistItem, Self::Error>> + Send + '_;

  /// Every item of the trip with its artifacts, ordered by
  /// `(category, name)`.
  fn get_report(
    &self,
    trip_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChecklistItem>, Self::Error>> + Send + '_;

  // ── Artifacts ─────────────────────────────────────────────────────────

  fn create_artifact(
    &self,
    input: NewArtifact,
  ) -> impl Future<Output = Result<Artifact, Self::Error>> + Send + '_;

  fn get_artifact(
    &self,
    artifact_id: Uuid,
  ) -> impl Future<Output = Result<Option<Artifact>, Self::Error>> + Send + '_;
}

// ─── Change feed ─────────────────────────────────────────────────────────────

/// A source of row-level change notifications.
///
/// `connect` may fail or hang; callers bound it with a timeout and retry.
pub trait ChangeFeed: Send + Sync {
  type Stream: ChangeStream<Error = Self::Error>;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Open a stream positioned after `resume_after`, or at the current head
  /// when `None` (history is not replayed).
  fn connect(
    &self,
    resume_after: Option<i64>,
  ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + '_;
}

/// A connected change stream.
pub trait ChangeStream: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Wait for the next non-empty batch of changes, in feed order.
  fn next_batch(
    &mut self,
  ) -> impl Future<Output = Result<Vec<RawChange>, Self::Error>> + Send + '_;
}
