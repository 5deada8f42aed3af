//! Integration tests for `SqliteStore` against an in-memory database.

use std::{sync::Arc, time::Duration};

use deckhand_core::{
  Classify, ErrorKind,
  bridge::{BatchStatus, ItemUpdate, ToolBridge},
  crew::Resolution,
  event::{Action, ChangeEvent, Table},
  item::{ItemType, ItemUpsert, NewArtifact},
  state::{BoxError, NoSessionState, SessionFuture, SessionStateSource, StateAggregator},
  store::{ChangeFeed, ChangeStream, ChecklistStore},
  trip::{NewTrip, Trip, TripMetadata, TripStatus, TripType},
  user::Principal,
};
use serde_json::json;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn trip(s: &SqliteStore, session: &str) -> Trip {
  s.get_or_create_trip(NewTrip { session_id: session.into(), ..NewTrip::default() })
    .await
    .unwrap()
}

fn upsert(trip: &Trip, name: &str, checked: bool) -> ItemUpsert {
  ItemUpsert::new(trip.trip_id, name, checked)
}

// ─── Trips ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_or_create_is_idempotent_per_session() {
  let s = store().await;
  let a = trip(&s, "sess-1").await;
  let b = trip(&s, "sess-1").await;
  let c = trip(&s, "sess-2").await;

  assert_eq!(a.trip_id, b.trip_id);
  assert_ne!(a.trip_id, c.trip_id);
  assert_eq!(a.trip_type, TripType::Departing);
  assert_eq!(a.status, TripStatus::Draft);
}

#[tokio::test]
async fn first_registered_joiner_claims_ownerless_trip() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  assert_eq!(t.user_id, None);

  let claimed = s
    .get_or_create_trip(NewTrip {
      session_id: "sess".into(),
      user_id: Some("user_1".into()),
      ..NewTrip::default()
    })
    .await
    .unwrap();
  assert_eq!(claimed.user_id.as_deref(), Some("user_1"));

  let again = s
    .get_or_create_trip(NewTrip {
      session_id: "sess".into(),
      user_id: Some("user_2".into()),
      ..NewTrip::default()
    })
    .await
    .unwrap();
  assert_eq!(again.user_id.as_deref(), Some("user_1"));
}

#[tokio::test]
async fn blank_session_id_is_rejected() {
  let s = store().await;
  let err = s
    .get_or_create_trip(NewTrip { session_id: "  ".into(), ..NewTrip::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn metadata_update_keeps_unsupplied_fields() {
  let s = store().await;
  let t = s
    .get_or_create_trip(NewTrip {
      session_id: "sess".into(),
      captain_name: Some("Ann".into()),
      ..NewTrip::default()
    })
    .await
    .unwrap();

  let t = s
    .update_trip_metadata(t.trip_id, TripMetadata { boat_name: Some("Wren".into()), captain_name: None })
    .await
    .unwrap();
  assert_eq!(t.boat_name.as_deref(), Some("Wren"));
  assert_eq!(t.captain_name.as_deref(), Some("Ann"));

  let t = s.update_trip_status(t.trip_id, TripStatus::Ready).await.unwrap();
  assert_eq!(t.status, TripStatus::Ready);
  let t = s.update_trip_type(t.trip_id, TripType::Returning).await.unwrap();
  assert_eq!(t.trip_type, TripType::Returning);
}

#[tokio::test]
async fn updates_on_missing_trip_are_not_found() {
  let s = store().await;
  let missing = Uuid::new_v4();

  let err = s.update_trip_status(missing, TripStatus::Ready).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = s.delete_trip(missing).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = s.upsert_item(ItemUpsert::new(missing, "Oil", true)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  let err = s.get_report(missing).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn list_user_trips_includes_crewed_trips_newest_first() {
  let s = store().await;
  let owned = s
    .get_or_create_trip(NewTrip {
      session_id: "a".into(),
      user_id: Some("user_1".into()),
      ..NewTrip::default()
    })
    .await
    .unwrap();
  tokio::time::sleep(Duration::from_millis(2)).await;
  let joined = trip(&s, "b").await;
  s.add_crew(joined.trip_id, "user_1".into(), "Ann".into()).await.unwrap();
  trip(&s, "c").await;

  let trips = s.list_user_trips("user_1".into()).await.unwrap();
  let ids: Vec<Uuid> = trips.iter().map(|t| t.trip_id).collect();
  assert_eq!(ids, vec![joined.trip_id, owned.trip_id]);
}

#[tokio::test]
async fn delete_cascades_to_items_crew_and_artifacts() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  s.add_crew(t.trip_id, "user_1".into(), "Ann".into()).await.unwrap();
  let photo = s
    .create_artifact(NewArtifact {
      trip_id:     Some(t.trip_id),
      filename:    "oil.jpg".into(),
      mime_type:   Some("image/jpeg".into()),
      storage_ref: "uploads/oil.jpg".into(),
    })
    .await
    .unwrap();
  s.attach_photo(t.trip_id, "Oil".into(), photo.artifact_id, None)
    .await
    .unwrap();

  s.delete_trip(t.trip_id).await.unwrap();

  assert!(s.get_trip(t.trip_id).await.unwrap().is_none());
  assert!(s.get_artifact(photo.artifact_id).await.unwrap().is_none());
  assert!(s.list_user_trips("user_1".into()).await.unwrap().is_empty());
}

// ─── Upsert merge policy ─────────────────────────────────────────────────────

#[tokio::test]
async fn identical_upserts_yield_one_row() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let a = s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();
  let b = s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();

  assert_eq!(a.item_id, b.item_id);
  assert_eq!(s.get_report(t.trip_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_upserts_converge_on_one_row() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let mut handles = Vec::new();
  for i in 0..16 {
    let s = s.clone();
    let up = upsert(&t, "Flares", i % 2 == 0);
    handles.push(tokio::spawn(async move { s.upsert_item(up).await }));
  }
  let mut ids = Vec::new();
  for h in handles {
    ids.push(h.await.unwrap().unwrap().item_id);
  }
  ids.dedup();
  assert_eq!(ids.len(), 1);
  assert_eq!(s.get_report(t.trip_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn assignment_is_sticky_across_checkbox_toggles() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let mut assign = upsert(&t, "Oil", false);
  assign.assigned_user_id = Some("user_a".into());
  assign.assigned_name = Some("Ann".into());
  s.upsert_item(assign).await.unwrap();

  let toggled = s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();
  assert!(toggled.checked);
  assert_eq!(toggled.assigned_to_user_id.as_deref(), Some("user_a"));
  assert_eq!(toggled.assigned_to_name.as_deref(), Some("Ann"));
}

#[tokio::test]
async fn assignment_pair_is_replaced_together() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let mut assign = upsert(&t, "Oil", false);
  assign.assigned_user_id = Some("user_a".into());
  assign.assigned_name = Some("Ann".into());
  s.upsert_item(assign).await.unwrap();

  let mut reassign = upsert(&t, "Oil", false);
  reassign.assigned_name = Some("Bob".into());
  let item = s.upsert_item(reassign).await.unwrap();
  assert_eq!(item.assigned_to_name.as_deref(), Some("Bob"));
  assert_eq!(item.assigned_to_user_id, None);
}

#[tokio::test]
async fn empty_location_never_erases_known_location() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let mut first = upsert(&t, "Life jackets", true);
  first.location = Some("Aft locker".into());
  s.upsert_item(first).await.unwrap();

  let mut blank = upsert(&t, "Life jackets", false);
  blank.location = Some(String::new());
  let item = s.upsert_item(blank).await.unwrap();
  assert_eq!(item.location.as_deref(), Some("Aft locker"));

  let mut moved = upsert(&t, "Life jackets", true);
  moved.location = Some("Bow".into());
  let item = s.upsert_item(moved).await.unwrap();
  assert_eq!(item.location.as_deref(), Some("Bow"));
}

#[tokio::test]
async fn completion_is_last_writer_wins_and_cleared_on_uncheck() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let mut by_ann = upsert(&t, "Oil", true);
  by_ann.acting_user_id = Some("user_a".into());
  by_ann.completed_by_name = Some("Ann".into());
  s.upsert_item(by_ann).await.unwrap();

  let mut by_bob = upsert(&t, "Oil", true);
  by_bob.acting_user_id = Some("guest_Bob".into());
  by_bob.completed_by_name = Some("Bob".into());
  let item = s.upsert_item(by_bob).await.unwrap();
  assert_eq!(item.completed_by_user_id.as_deref(), Some("guest_Bob"));
  assert_eq!(item.completed_by_name.as_deref(), Some("Bob"));

  let mut undo = upsert(&t, "Oil", false);
  undo.acting_user_id = Some("user_a".into());
  undo.completed_by_name = Some("Ann".into());
  let item = s.upsert_item(undo).await.unwrap();
  assert!(!item.checked);
  assert_eq!(item.completed_by_user_id, None);
  assert_eq!(item.completed_by_name, None);
}

#[tokio::test]
async fn optional_fields_are_kept_when_not_supplied() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let mut first = upsert(&t, "Fuel", false);
  first.category = Some("Engine".into());
  first.item_type = Some(ItemType::Count);
  first.count_value = Some(3);
  first.flagged_issue = Some("Low".into());
  s.upsert_item(first).await.unwrap();

  let mut second = upsert(&t, "Fuel", true);
  second.category = Some("Deck".into());
  let item = s.upsert_item(second).await.unwrap();
  assert_eq!(item.category, "Engine");
  assert_eq!(item.item_type, ItemType::Count);
  assert_eq!(item.count_value, 3);
  assert_eq!(item.flagged_issue.as_deref(), Some("Low"));

  let mut cleared = upsert(&t, "Fuel", true);
  cleared.flagged_issue = Some(String::new());
  let item = s.upsert_item(cleared).await.unwrap();
  assert_eq!(item.flagged_issue, None);
}

#[tokio::test]
async fn invalid_item_names_are_rejected() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  let err = s.upsert_item(upsert(&t, "   ", true)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}

// ─── Artifacts and report ────────────────────────────────────────────────────

#[tokio::test]
async fn missing_photo_rolls_back_the_upsert() {
  let s = store().await;
  let t = trip(&s, "sess").await;

  let mut up = upsert(&t, "Oil", true);
  up.photo_ref = Some(Uuid::new_v4());
  let err = s.upsert_item(up).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(s.get_report(t.trip_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn photo_from_another_trip_is_not_linked() {
  let s = store().await;
  let a = trip(&s, "a").await;
  let b = trip(&s, "b").await;
  let photo = s
    .create_artifact(NewArtifact {
      trip_id:     Some(a.trip_id),
      filename:    "x.jpg".into(),
      mime_type:   None,
      storage_ref: "uploads/x.jpg".into(),
    })
    .await
    .unwrap();

  let err = s
    .attach_photo(b.trip_id, "Oil".into(), photo.artifact_id, None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn upload_before_item_links_lazily() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  let photo = s
    .create_artifact(NewArtifact {
      trip_id:     None,
      filename:    "flares.jpg".into(),
      mime_type:   Some("image/jpeg".into()),
      storage_ref: "uploads/flares.jpg".into(),
    })
    .await
    .unwrap();
  assert_eq!(photo.item_id, None);

  let item = s
    .attach_photo(t.trip_id, "Flares".into(), photo.artifact_id, Some("user_1".into()))
    .await
    .unwrap();
  assert!(item.checked);

  let linked = s.get_artifact(photo.artifact_id).await.unwrap().unwrap();
  assert_eq!(linked.item_id, Some(item.item_id));
  assert_eq!(linked.trip_id, Some(t.trip_id));
}

#[tokio::test]
async fn photo_from_another_crew_member_keeps_completer() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  let mut up = upsert(&t, "Oil", true);
  up.location = Some("engine bay".into());
  up.acting_user_id = Some("guest_Ann".into());
  up.completed_by_name = Some("Ann".into());
  s.upsert_item(up).await.unwrap();

  let photo = s
    .create_artifact(NewArtifact {
      trip_id:     Some(t.trip_id),
      filename:    "oil.jpg".into(),
      mime_type:   None,
      storage_ref: "uploads/oil.jpg".into(),
    })
    .await
    .unwrap();
  let item = s
    .attach_photo(t.trip_id, "Oil".into(), photo.artifact_id, Some("guest_Bob".into()))
    .await
    .unwrap();

  assert!(item.checked);
  assert_eq!(item.completed_by_user_id.as_deref(), Some("guest_Ann"));
  assert_eq!(item.completed_by_name.as_deref(), Some("Ann"));
  assert_eq!(item.location.as_deref(), Some("engine bay"));
}

#[tokio::test]
async fn photo_on_unattributed_item_records_uploader() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  s.upsert_item(upsert(&t, "Bilge", false)).await.unwrap();

  let photo = s
    .create_artifact(NewArtifact {
      trip_id:     Some(t.trip_id),
      filename:    "bilge.jpg".into(),
      mime_type:   None,
      storage_ref: "uploads/bilge.jpg".into(),
    })
    .await
    .unwrap();
  let item = s
    .attach_photo(t.trip_id, "Bilge".into(), photo.artifact_id, Some("user_2".into()))
    .await
    .unwrap();

  assert!(item.checked);
  assert_eq!(item.completed_by_user_id.as_deref(), Some("user_2"));
}

#[tokio::test]
async fn report_is_ordered_with_photos_and_current_names() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  s.put_user("user_1".into(), Some("Ann".into())).await.unwrap();

  for (category, name) in [("Safety", "Flares"), ("Engine", "Oil"), ("Engine", "Fuel")] {
    let mut up = upsert(&t, name, true);
    up.category = Some(category.into());
    up.acting_user_id = Some("user_1".into());
    up.completed_by_name = Some("Annie".into());
    s.upsert_item(up).await.unwrap();
  }
  let photo = s
    .create_artifact(NewArtifact {
      trip_id:     Some(t.trip_id),
      filename:    "oil.jpg".into(),
      mime_type:   None,
      storage_ref: "uploads/oil.jpg".into(),
    })
    .await
    .unwrap();
  s.attach_photo(t.trip_id, "Oil".into(), photo.artifact_id, Some("user_1".into()))
    .await
    .unwrap();

  let report = s.get_report(t.trip_id).await.unwrap();
  let names: Vec<&str> = report.iter().map(|i| i.name.as_str()).collect();
  assert_eq!(names, vec!["Fuel", "Oil", "Flares"]);
  assert_eq!(report[1].photos.len(), 1);
  assert_eq!(report[1].photos[0].artifact_id, photo.artifact_id);
  assert!(report[0].photos.is_empty());
  assert_eq!(report[0].completed_by_user_name.as_deref(), Some("Ann"));
}

// ─── Crew and resolution ─────────────────────────────────────────────────────

#[tokio::test]
async fn crew_set_comes_from_trusted_sources_only() {
  let s = store().await;
  s.put_user("owner".into(), Some("Olivia".into())).await.unwrap();
  s.put_user("user_c".into(), Some("Carl".into())).await.unwrap();
  let t = s
    .get_or_create_trip(NewTrip {
      session_id: "sess".into(),
      user_id: Some("owner".into()),
      captain_name: Some("Terrence Ryan".into()),
      ..NewTrip::default()
    })
    .await
    .unwrap();
  s.add_crew(t.trip_id, "guest_Ann".into(), "Ann".into()).await.unwrap();

  let mut assigned = upsert(&t, "Oil", false);
  assigned.assigned_user_id = Some("user_c".into());
  assigned.assigned_name = Some("Carl".into());
  s.upsert_item(assigned).await.unwrap();

  let mut free_text = upsert(&t, "Flares", false);
  free_text.assigned_name = Some("Zed".into());
  s.upsert_item(free_text).await.unwrap();

  let crew = s.crew_names(t.trip_id).await.unwrap();
  assert_eq!(crew, vec!["Ann", "Carl", "Olivia", "Terrence Ryan"]);
}

#[tokio::test]
async fn resolution_prefers_exact_then_alphabetical_substring() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  s.add_crew(t.trip_id, "guest_Anna".into(), "Anna".into()).await.unwrap();
  s.add_crew(t.trip_id, "guest_Ann".into(), "Ann".into()).await.unwrap();

  assert_eq!(
    s.resolve_assignee(t.trip_id, "ann".into()).await.unwrap(),
    Resolution { name: "Ann".into(), matched: true }
  );
  assert_eq!(
    s.resolve_assignee(t.trip_id, "an".into()).await.unwrap(),
    Resolution { name: "Ann".into(), matched: true }
  );
  assert_eq!(
    s.resolve_assignee(t.trip_id, "Bob".into()).await.unwrap(),
    Resolution { name: "Bob".into(), matched: false }
  );
}

#[tokio::test]
async fn find_user_by_name_ignores_case() {
  let s = store().await;
  s.put_user("user_1".into(), Some("Terrence Ryan".into())).await.unwrap();
  let found = s.find_user_by_name("terrence ryan".into()).await.unwrap().unwrap();
  assert_eq!(found.user_id, "user_1");
  assert!(s.find_user_by_name("Terrence".into()).await.unwrap().is_none());
}

// ─── Tool bridge ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_reports_partial_success_without_rollback() {
  let s = Arc::new(store().await);
  let t = trip(&s, "sess").await;
  let bridge = ToolBridge::new(Arc::clone(&s));

  let result = bridge
    .apply_batch(t.trip_id, &Principal::Guest { name: "Ann".into() }, vec![
      ItemUpdate { item_name: "Oil".into(), is_checked: true, ..ItemUpdate::default() },
      ItemUpdate { item_name: "  ".into(), is_checked: true, ..ItemUpdate::default() },
    ])
    .await
    .unwrap();

  assert_eq!(result.status, BatchStatus::PartialSuccess);
  assert_eq!(result.applied, vec!["Oil"]);
  assert_eq!(result.failed.len(), 1);
  assert!(result.failed[0].invalid);

  let report = s.get_report(t.trip_id).await.unwrap();
  assert_eq!(report.len(), 1);
  assert_eq!(report[0].completed_by_user_id.as_deref(), Some("guest_Ann"));
  assert_eq!(report[0].completed_by_name.as_deref(), Some("Ann"));
}

#[tokio::test]
async fn unmatched_assignee_is_recorded_with_warning() {
  let s = Arc::new(store().await);
  let t = trip(&s, "sess").await;
  s.add_crew(t.trip_id, "guest_Ann".into(), "Ann".into()).await.unwrap();
  let bridge = ToolBridge::new(Arc::clone(&s));

  let result = bridge
    .apply_batch(t.trip_id, &Principal::Anonymous, vec![
      ItemUpdate { item_name: "Oil".into(), is_checked: true, ..ItemUpdate::default() },
      ItemUpdate {
        item_name: "Flares".into(),
        assigned_to_name: Some("Bob".into()),
        ..ItemUpdate::default()
      },
    ])
    .await
    .unwrap();

  assert_eq!(result.status, BatchStatus::Warning);
  assert_eq!(result.applied, vec!["Oil", "Flares"]);
  assert_eq!(result.warnings.len(), 1);
  assert_eq!(result.warnings[0].item_name, "Flares");

  let report = s.get_report(t.trip_id).await.unwrap();
  let flares = report.iter().find(|i| i.name == "Flares").unwrap();
  assert_eq!(flares.assigned_to_name.as_deref(), Some("Bob"));
  assert!(!flares.checked);
}

#[tokio::test]
async fn matched_assignee_is_linked_to_registered_user() {
  let s = Arc::new(store().await);
  s.put_user("user_t".into(), Some("Terrence Ryan".into())).await.unwrap();
  let t = s
    .get_or_create_trip(NewTrip {
      session_id: "sess".into(),
      captain_name: Some("Terrence Ryan".into()),
      ..NewTrip::default()
    })
    .await
    .unwrap();
  let bridge = ToolBridge::new(Arc::clone(&s));

  let result = bridge
    .apply_batch(t.trip_id, &Principal::Anonymous, vec![ItemUpdate {
      item_name: "Oil".into(),
      assigned_to_name: Some("terrence".into()),
      ..ItemUpdate::default()
    }])
    .await
    .unwrap();
  assert_eq!(result.status, BatchStatus::Success);

  let item = &s.get_report(t.trip_id).await.unwrap()[0];
  assert_eq!(item.assigned_to_name.as_deref(), Some("Terrence Ryan"));
  assert_eq!(item.assigned_to_user_id.as_deref(), Some("user_t"));
}

#[tokio::test]
async fn assignee_falls_back_to_acting_user() {
  let s = Arc::new(store().await);
  s.put_user("user_1".into(), Some("Sarah".into())).await.unwrap();
  let t = trip(&s, "sess").await;
  let bridge = ToolBridge::new(Arc::clone(&s));

  let result = bridge
    .apply_batch(t.trip_id, &Principal::Registered { user_id: "user_1".into() }, vec![ItemUpdate {
      item_name: "Oil".into(),
      assigned_to_name: Some("sarah".into()),
      ..ItemUpdate::default()
    }])
    .await
    .unwrap();
  assert_eq!(result.status, BatchStatus::Success);

  let item = &s.get_report(t.trip_id).await.unwrap()[0];
  assert_eq!(item.assigned_to_name.as_deref(), Some("Sarah"));
  assert_eq!(item.assigned_to_user_id.as_deref(), Some("user_1"));
}

#[tokio::test]
async fn batch_and_direct_writes_converge() {
  let s = Arc::new(store().await);
  let t = trip(&s, "sess").await;
  let bridge = ToolBridge::new(Arc::clone(&s));
  let guest = Principal::Guest { name: "Ann".into() };

  let mut direct = upsert(&t, "Oil", true);
  direct.location = Some("Engine bay".into());
  s.upsert_item(direct).await.unwrap();
  bridge
    .apply_batch(t.trip_id, &guest, vec![ItemUpdate {
      item_name: "Oil".into(),
      is_checked: false,
      location: Some(String::new()),
      assigned_to_name: Some("Ann".into()),
      ..ItemUpdate::default()
    }])
    .await
    .unwrap();
  s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();

  let item = &s.get_report(t.trip_id).await.unwrap()[0];
  assert!(item.checked);
  assert_eq!(item.location.as_deref(), Some("Engine bay"));
  assert_eq!(item.assigned_to_name.as_deref(), Some("Ann"));
}

#[tokio::test]
async fn bridge_metadata_and_session_lookup() {
  let s = Arc::new(store().await);
  let t = trip(&s, "adk-session").await;
  let bridge = ToolBridge::new(Arc::clone(&s));

  assert_eq!(bridge.trip_for_session("adk-session").await.unwrap().trip_id, t.trip_id);
  let err = bridge.trip_for_session("nope").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let updated = bridge
    .update_metadata(t.trip_id, TripMetadata { boat_name: Some(" Wren ".into()), captain_name: Some("".into()) })
    .await
    .unwrap();
  assert_eq!(updated.boat_name.as_deref(), Some("Wren"));
  assert_eq!(updated.captain_name, None);
  assert!(bridge.checklist_status(t.trip_id).await.unwrap().is_empty());
}

// ─── Unified state ───────────────────────────────────────────────────────────

struct FixedSession(serde_json::Value);

impl SessionStateSource for FixedSession {
  fn session_state<'a>(&'a self, user_id: &'a str, _session_id: &'a str) -> SessionFuture<'a> {
    let state = (user_id == "user_1").then(|| self.0.clone());
    Box::pin(async move { Ok::<_, BoxError>(state) })
  }
}

struct BrokenSession;

impl SessionStateSource for BrokenSession {
  fn session_state<'a>(&'a self, _user_id: &'a str, _session_id: &'a str) -> SessionFuture<'a> {
    Box::pin(async { Err::<Option<serde_json::Value>, BoxError>("session service down".into()) })
  }
}

#[tokio::test]
async fn unified_state_merges_session_blob_as_advisory() {
  let s = Arc::new(store().await);
  let t = trip(&s, "sess").await;
  s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();

  let agg = StateAggregator::new(
    Arc::clone(&s),
    Arc::new(FixedSession(json!({ "items": "stale", "note": "check flares next" }))),
  );

  let state = agg.unified_state(t.trip_id, Some("user_1")).await.unwrap();
  assert_eq!(state.items.len(), 1);
  assert_eq!(state.assistant_state, Some(json!({ "note": "check flares next" })));

  let anon = agg.unified_state(t.trip_id, None).await.unwrap();
  assert_eq!(anon.assistant_state, None);
}

#[tokio::test]
async fn unified_state_survives_session_failures() {
  let s = Arc::new(store().await);
  let t = trip(&s, "sess").await;

  let agg = StateAggregator::new(Arc::clone(&s), Arc::new(BrokenSession));
  let state = agg.unified_state(t.trip_id, Some("user_1")).await.unwrap();
  assert_eq!(state.trip.trip_id, t.trip_id);
  assert_eq!(state.assistant_state, None);

  let agg = StateAggregator::new(Arc::clone(&s), Arc::new(NoSessionState));
  let err = agg.unified_state(Uuid::new_v4(), None).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Change feed ─────────────────────────────────────────────────────────────

async fn next_events<S: ChangeStream>(stream: &mut S) -> Vec<ChangeEvent> {
  let batch = tokio::time::timeout(Duration::from_secs(2), stream.next_batch())
    .await
    .expect("batch before timeout")
    .unwrap();
  batch
    .iter()
    .map(|c| ChangeEvent::parse(&c.payload).unwrap())
    .collect()
}

#[tokio::test]
async fn feed_starts_at_head_and_reports_item_changes() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  let feed = s.change_feed(Duration::from_millis(20));
  let mut stream = feed.connect(None).await.unwrap();

  s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();

  let events = next_events(&mut stream).await;
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].table, Table::ChecklistItem);
  assert_eq!(events[0].action, Action::Insert);
  assert_eq!(events[0].channel(), Some(t.channel()));
  assert_eq!(events[0].data.as_ref().unwrap()["name"], "Oil");
}

#[tokio::test]
async fn delete_events_carry_the_trip_id() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();
  let mut stream = s.change_feed(Duration::from_millis(20)).connect(None).await.unwrap();

  s.delete_trip(t.trip_id).await.unwrap();

  let events = next_events(&mut stream).await;
  assert!(events.iter().all(|e| e.action == Action::Delete));
  assert!(events.iter().all(|e| e.channel() == Some(t.channel())));
  assert!(events.iter().any(|e| e.table == Table::Trip));
}

#[tokio::test]
async fn unlinked_artifacts_have_no_channel() {
  let s = store().await;
  let mut stream = s.change_feed(Duration::from_millis(20)).connect(None).await.unwrap();

  s.create_artifact(NewArtifact {
    trip_id:     None,
    filename:    "a.jpg".into(),
    mime_type:   None,
    storage_ref: "uploads/a.jpg".into(),
  })
  .await
  .unwrap();

  let events = next_events(&mut stream).await;
  assert_eq!(events[0].table, Table::Artifact);
  assert_eq!(events[0].channel(), None);
}

#[tokio::test]
async fn feed_resumes_after_cursor() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  let feed = s.change_feed(Duration::from_millis(20));
  let mut stream = feed.connect(None).await.unwrap();

  s.upsert_item(upsert(&t, "Oil", true)).await.unwrap();
  let first = stream.next_batch().await.unwrap();
  let cursor = stream.cursor();
  assert_eq!(cursor, first.last().unwrap().seq);
  drop(stream);

  s.upsert_item(upsert(&t, "Flares", true)).await.unwrap();
  let mut resumed = feed.connect(Some(cursor)).await.unwrap();
  let events = next_events(&mut resumed).await;
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].data.as_ref().unwrap()["name"], "Flares");
}

#[tokio::test]
async fn file_backed_feed_uses_its_own_connection() {
  let dir = tempfile::tempdir().unwrap();
  let s = SqliteStore::open(dir.path().join("deckhand.db")).await.unwrap();
  let t = trip(&s, "sess").await;
  let mut stream = s.change_feed(Duration::from_millis(20)).connect(None).await.unwrap();

  s.update_trip_status(t.trip_id, TripStatus::Ready).await.unwrap();

  let events = next_events(&mut stream).await;
  assert_eq!(events[0].table, Table::Trip);
  assert_eq!(events[0].action, Action::Update);
  assert_eq!(events[0].data.as_ref().unwrap()["status"], "Ready");
}

#[tokio::test]
async fn change_log_is_bounded_without_a_reader() {
  let s = store().await;
  let t = trip(&s, "sess").await;
  for n in 0..crate::schema::LOG_CAP + 50 {
    s.upsert_item(upsert(&t, "Oil", n % 2 == 0)).await.unwrap();
  }

  let (rows, newest): (i64, i64) = s
    .conn
    .call(|conn| {
      Ok(conn.query_row("SELECT COUNT(*), MAX(seq) FROM change_log", [], |r| {
        Ok((r.get(0)?, r.get(1)?))
      })?)
    })
    .await
    .unwrap();
  assert!(rows <= crate::schema::LOG_CAP);
  assert!(newest > crate::schema::LOG_CAP);

  // A reader connecting now still sees new writes.
  let mut stream = s.change_feed(Duration::from_millis(20)).connect(None).await.unwrap();
  s.upsert_item(upsert(&t, "Flares", true)).await.unwrap();
  let events = next_events(&mut stream).await;
  assert_eq!(events[0].data.as_ref().unwrap()["name"], "Flares");
}
