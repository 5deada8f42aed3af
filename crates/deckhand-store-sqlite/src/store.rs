//! [`SqliteStore`] — the SQLite implementation of [`ChecklistStore`].

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use deckhand_core::{
  crew,
  item::{Artifact, ChecklistItem, DEFAULT_CATEGORY, ItemUpsert, NewArtifact, validate_item_name},
  store::ChecklistStore,
  trip::{NewTrip, Trip, TripMetadata, TripStatus, TripType},
  user::User,
};

use crate::{
  Error, Result,
  encode::{
    ARTIFACT_COLUMNS, ITEM_COLUMNS, RawArtifact, RawItem, RawTrip, RawUser, TRIP_COLUMNS,
    USER_COLUMNS, encode_dt, encode_uuid,
  },
  schema,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Deckhand checklist store backed by a single SQLite database.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  /// `None` for in-memory databases.
  pub(crate) path: Option<PathBuf>,
  /// Raised after every committed write to a tracked table.
  pub(crate) wake: Arc<Notify>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn, path: Some(path), wake: Arc::new(Notify::new()) };
    store.init_schema().await?;
    info!(path = ?store.path, "opened checklist store");
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, path: None, wake: Arc::new(Notify::new()) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let ddl = schema::ddl();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn changed(&self) { self.wake.notify_one(); }

  async fn trip_by(&self, column: &'static str, key: String) -> Result<Option<Trip>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_trip(conn, column, &key)?))
      .await?;
    raw.map(RawTrip::into_trip).transpose()
  }

  /// Run a single-row `UPDATE ... RETURNING` against `trips`.
  async fn update_trip(&self, trip_id: Uuid, sql: &'static str, value: Option<String>) -> Result<Trip> {
    let id = encode_uuid(trip_id);
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!("{sql} RETURNING {TRIP_COLUMNS}");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id, value], RawTrip::from_row)
            .optional()?,
        )
      })
      .await?;
    let trip = raw
      .ok_or(deckhand_core::Error::TripNotFound(trip_id))?
      .into_trip()?;
    self.changed();
    Ok(trip)
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn trip_exists(conn: &rusqlite::Connection, trip_id: &str) -> rusqlite::Result<bool> {
  conn
    .query_row("SELECT 1 FROM trips WHERE trip_id = ?1", [trip_id], |_| Ok(()))
    .optional()
    .map(|r| r.is_some())
}

fn select_trip(
  conn: &rusqlite::Connection,
  column: &str,
  key: &str,
) -> rusqlite::Result<Option<RawTrip>> {
  conn
    .query_row(
      &format!("SELECT {TRIP_COLUMNS} FROM trips WHERE {column} = ?1"),
      [key],
      RawTrip::from_row,
    )
    .optional()
}

fn select_item(conn: &rusqlite::Connection, item_id: &str) -> rusqlite::Result<Option<RawItem>> {
  conn
    .query_row(
      &format!(
        "SELECT {ITEM_COLUMNS} FROM checklist_items i
         LEFT JOIN users u ON u.user_id = i.completed_by_user_id
         WHERE i.item_id = ?1"
      ),
      [item_id],
      RawItem::from_row,
    )
    .optional()
}

/// Point an artifact at an item. `false` when the artifact is missing or
/// belongs to another trip.
fn link_artifact(
  conn: &rusqlite::Connection,
  item_id: &str,
  trip_id: &str,
  artifact_id: Uuid,
) -> rusqlite::Result<bool> {
  let linked = conn.execute(
    "UPDATE artifacts SET item_id = ?1, trip_id = COALESCE(trip_id, ?2)
     WHERE artifact_id = ?3 AND (trip_id IS NULL OR trip_id = ?2)",
    rusqlite::params![item_id, trip_id, encode_uuid(artifact_id)],
  )?;
  Ok(linked > 0)
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Outcome of the upsert transaction; missing rows abort it.
enum Upserted {
  Item(RawItem),
  TripMissing,
  ArtifactMissing(Uuid),
}

const UPSERT_ITEM: &str = "
INSERT INTO checklist_items (
    item_id, trip_id, category, name, item_type, is_checked, count_value,
    location_text, flagged_issue, completed_by_user_id, completed_by_name,
    assigned_to_user_id, assigned_to_name, updated_at
) VALUES (
    ?1, ?2, ?3, ?4, COALESCE(?5, 'checkbox'), ?6, COALESCE(?7, 0),
    ?8, NULLIF(?9, ''), ?10, ?11, ?12, ?13, ?14
)
ON CONFLICT (trip_id, name) DO UPDATE SET
    is_checked           = excluded.is_checked,
    completed_by_user_id = excluded.completed_by_user_id,
    completed_by_name    = excluded.completed_by_name,
    location_text        = COALESCE(excluded.location_text, checklist_items.location_text),
    item_type            = COALESCE(?5, checklist_items.item_type),
    count_value          = COALESCE(?7, checklist_items.count_value),
    flagged_issue        = CASE WHEN ?9 IS NULL THEN checklist_items.flagged_issue
                                ELSE NULLIF(?9, '') END,
    assigned_to_user_id  = CASE WHEN ?12 IS NULL AND ?13 IS NULL
                                THEN checklist_items.assigned_to_user_id ELSE ?12 END,
    assigned_to_name     = CASE WHEN ?12 IS NULL AND ?13 IS NULL
                                THEN checklist_items.assigned_to_name ELSE ?13 END,
    updated_at           = excluded.updated_at
RETURNING item_id";

/// Create the item checked, or check an existing one. Attribution is only
/// filled in when the row has none, so an earlier completer is never
/// replaced by the uploader.
const ATTACH_PHOTO: &str = "
INSERT INTO checklist_items (
    item_id, trip_id, category, name, is_checked, completed_by_user_id, updated_at
) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
ON CONFLICT (trip_id, name) DO UPDATE SET
    is_checked           = 1,
    completed_by_user_id = CASE
        WHEN checklist_items.completed_by_user_id IS NULL
         AND checklist_items.completed_by_name IS NULL
        THEN excluded.completed_by_user_id
        ELSE checklist_items.completed_by_user_id END,
    updated_at           = excluded.updated_at
RETURNING item_id";

/// Every name that counts as trusted crew for a trip. Free-text assignment
/// and completion names are deliberately absent.
const CREW_NAMES: &str = "
SELECT captain_name FROM trips WHERE trip_id = ?1 AND captain_name IS NOT NULL
UNION
SELECT display_name FROM trip_crew WHERE trip_id = ?1
UNION
SELECT u.name FROM trips t JOIN users u ON u.user_id = t.user_id
 WHERE t.trip_id = ?1 AND u.name IS NOT NULL
UNION
SELECT u.name FROM checklist_items i
  JOIN users u ON u.user_id IN (i.assigned_to_user_id, i.completed_by_user_id)
 WHERE i.trip_id = ?1 AND u.name IS NOT NULL";

// ─── ChecklistStore impl ─────────────────────────────────────────────────────

impl ChecklistStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn put_user(&self, user_id: String, name: Option<String>) -> Result<User> {
    let user_id = user_id.trim().to_owned();
    if user_id.is_empty() {
      return Err(deckhand_core::Error::Validation("user id must not be empty".into()).into());
    }
    let name = non_blank(name);
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO users (user_id, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id) DO UPDATE SET name = excluded.name
             RETURNING {USER_COLUMNS}"
          ),
          rusqlite::params![user_id, name, now],
          RawUser::from_row,
        )?)
      })
      .await?;
    raw.into_user()
  }

  async fn get_user(&self, user_id: String) -> Result<Option<User>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              [user_id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_name(&self, name: String) -> Result<Option<User>> {
    let name = name.trim().to_owned();
    if name.is_empty() {
      return Ok(None);
    }
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE name = ?1 COLLATE NOCASE
                 ORDER BY created_at, user_id LIMIT 1"
              ),
              [name],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  // ── Trips ─────────────────────────────────────────────────────────────────

  async fn get_or_create_trip(&self, input: NewTrip) -> Result<Trip> {
    let session_id = input.session_id.trim().to_owned();
    if session_id.is_empty() {
      return Err(deckhand_core::Error::Validation("session id must not be empty".into()).into());
    }

    let trip_id = encode_uuid(Uuid::new_v4());
    let user_id = non_blank(input.user_id);
    let captain = non_blank(input.captain_name);
    let trip_type = input.trip_type.unwrap_or_default().as_str();
    let status = TripStatus::default().as_str();
    let now = encode_dt(Utc::now());
    let key = session_id.clone();

    let (raw, written) = self
      .conn
      .call(move |conn| {
        // The conflict branch only claims an ownerless trip; otherwise the
        // existing row is left untouched and no change is emitted.
        let written = conn.execute(
          "INSERT INTO trips (trip_id, session_id, user_id, captain_name, trip_type, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (session_id) DO UPDATE SET user_id = excluded.user_id
           WHERE trips.user_id IS NULL AND excluded.user_id IS NOT NULL",
          rusqlite::params![trip_id, session_id, user_id, captain, trip_type, status, now],
        )?;
        Ok((select_trip(conn, "session_id", &key)?, written))
      })
      .await?;

    let trip = raw
      .ok_or_else(|| deckhand_core::Error::SessionNotFound(input.session_id.clone()))?
      .into_trip()?;
    if written > 0 {
      debug!(trip_id = %trip.trip_id, session = %trip.session_id, "trip created or claimed");
      self.changed();
    }
    Ok(trip)
  }

  async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>> {
    self.trip_by("trip_id", encode_uuid(trip_id)).await
  }

  async fn get_trip_by_session(&self, session_id: String) -> Result<Option<Trip>> {
    self.trip_by("session_id", session_id).await
  }

  async fn list_user_trips(&self, user_id: String) -> Result<Vec<Trip>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRIP_COLUMNS} FROM trips
           WHERE user_id = ?1
              OR trip_id IN (SELECT trip_id FROM trip_crew WHERE user_id = ?1)
           ORDER BY created_at DESC, trip_id"
        ))?;
        let rows = stmt
          .query_map([user_id], RawTrip::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawTrip::into_trip).collect()
  }

  async fn update_trip_status(&self, trip_id: Uuid, status: TripStatus) -> Result<Trip> {
    self
      .update_trip(
        trip_id,
        "UPDATE trips SET status = ?2 WHERE trip_id = ?1",
        Some(status.as_str().to_owned()),
      )
      .await
  }

  async fn update_trip_type(&self, trip_id: Uuid, trip_type: TripType) -> Result<Trip> {
    self
      .update_trip(
        trip_id,
        "UPDATE trips SET trip_type = ?2 WHERE trip_id = ?1",
        Some(trip_type.as_str().to_owned()),
      )
      .await
  }

  async fn update_trip_metadata(&self, trip_id: Uuid, metadata: TripMetadata) -> Result<Trip> {
    if metadata.is_empty() {
      return self
        .get_trip(trip_id)
        .await?
        .ok_or_else(|| deckhand_core::Error::TripNotFound(trip_id).into());
    }

    let id = encode_uuid(trip_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE trips SET boat_name    = COALESCE(?2, boat_name),
                                  captain_name = COALESCE(?3, captain_name)
                 WHERE trip_id = ?1
                 RETURNING {TRIP_COLUMNS}"
              ),
              rusqlite::params![id, metadata.boat_name, metadata.captain_name],
              RawTrip::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    let trip = raw
      .ok_or(deckhand_core::Error::TripNotFound(trip_id))?
      .into_trip()?;
    self.changed();
    Ok(trip)
  }

  async fn delete_trip(&self, trip_id: Uuid) -> Result<()> {
    let id = encode_uuid(trip_id);
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM trips WHERE trip_id = ?1", [id])?))
      .await?;
    if deleted == 0 {
      return Err(deckhand_core::Error::TripNotFound(trip_id).into());
    }
    info!(%trip_id, "trip deleted");
    self.changed();
    Ok(())
  }

  // ── Crew ──────────────────────────────────────────────────────────────────

  async fn add_crew(&self, trip_id: Uuid, user_id: String, display_name: String) -> Result<()> {
    let display_name = display_name.trim().to_owned();
    if user_id.trim().is_empty() || display_name.is_empty() {
      return Err(
        deckhand_core::Error::Validation("crew member needs an id and a name".into()).into(),
      );
    }

    let id = encode_uuid(trip_id);
    let now = encode_dt(Utc::now());
    let found = self
      .conn
      .call(move |conn| {
        if !trip_exists(conn, &id)? {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO trip_crew (trip_id, user_id, display_name, joined_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (trip_id, user_id) DO UPDATE SET display_name = excluded.display_name",
          rusqlite::params![id, user_id, display_name, now],
        )?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(deckhand_core::Error::TripNotFound(trip_id).into());
    }
    Ok(())
  }

  async fn crew_names(&self, trip_id: Uuid) -> Result<Vec<String>> {
    let id = encode_uuid(trip_id);
    let names = self
      .conn
      .call(move |conn| {
        if !trip_exists(conn, &id)? {
          return Ok(None);
        }
        let mut stmt = conn.prepare(CREW_NAMES)?;
        let names = stmt
          .query_map([&id], |r| r.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(names))
      })
      .await?
      .ok_or(deckhand_core::Error::TripNotFound(trip_id))?;
    Ok(crew::normalize(names))
  }

  // ── Items ─────────────────────────────────────────────────────────────────

  async fn upsert_item(&self, input: ItemUpsert) -> Result<ChecklistItem> {
    let name = validate_item_name(&input.name)?.to_owned();
    let (completed_by_id, completed_by_name) = input.completion();
    let completed_by_id = completed_by_id.map(str::to_owned);
    let completed_by_name = completed_by_name.map(str::to_owned);
    let location = input.location().map(str::to_owned);

    let trip_id = input.trip_id;
    let photo_ref = input.photo_ref;
    let trip_str = encode_uuid(trip_id);
    let item_id = encode_uuid(Uuid::new_v4());
    let category = non_blank(input.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
    let item_type = input.item_type.map(|t| t.as_str());
    let assigned_user = non_blank(input.assigned_user_id);
    let assigned_name = non_blank(input.assigned_name);
    let now = encode_dt(Utc::now());
    let checked = input.checked;
    let count_value = input.count_value;
    let flagged_issue = input.flagged_issue;
    let item_label = name.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !trip_exists(&tx, &trip_str)? {
          return Ok(Upserted::TripMissing);
        }

        let item_id: String = tx.query_row(
          UPSERT_ITEM,
          rusqlite::params![
            item_id,
            trip_str,
            category,
            name,
            item_type,
            checked,
            count_value,
            location,
            flagged_issue,
            completed_by_id,
            completed_by_name,
            assigned_user,
            assigned_name,
            now,
          ],
          |r| r.get(0),
        )?;

        if let Some(photo) = photo_ref
          && !link_artifact(&tx, &item_id, &trip_str, photo)?
        {
          return Ok(Upserted::ArtifactMissing(photo));
        }

        tx.commit()?;
        match select_item(conn, &item_id)? {
          Some(raw) => Ok(Upserted::Item(raw)),
          None => Ok(Upserted::TripMissing),
        }
      })
      .await?;

    match outcome {
      Upserted::Item(raw) => {
        let item = raw.into_item()?;
        debug!(%trip_id, item = %item.name, checked = item.checked, "item upserted");
        self.changed();
        Ok(item)
      }
      Upserted::TripMissing => Err(deckhand_core::Error::TripNotFound(trip_id).into()),
      Upserted::ArtifactMissing(artifact_id) => {
        debug!(%trip_id, item = %item_label, %artifact_id, "photo link failed, upsert rolled back");
        Err(deckhand_core::Error::ArtifactNotFound(artifact_id).into())
      }
    }
  }

  async fn attach_photo(
    &self,
    trip_id: Uuid,
    item_name: String,
    artifact_id: Uuid,
    acting_user_id: Option<String>,
  ) -> Result<ChecklistItem> {
    let name = validate_item_name(&item_name)?.to_owned();
    let trip_str = encode_uuid(trip_id);
    let item_id = encode_uuid(Uuid::new_v4());
    let acting = non_blank(acting_user_id);
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !trip_exists(&tx, &trip_str)? {
          return Ok(Upserted::TripMissing);
        }

        let item_id: String = tx.query_row(
          ATTACH_PHOTO,
          rusqlite::params![item_id, trip_str, DEFAULT_CATEGORY, name, acting, now],
          |r| r.get(0),
        )?;
        if !link_artifact(&tx, &item_id, &trip_str, artifact_id)? {
          return Ok(Upserted::ArtifactMissing(artifact_id));
        }

        tx.commit()?;
        match select_item(conn, &item_id)? {
          Some(raw) => Ok(Upserted::Item(raw)),
          None => Ok(Upserted::TripMissing),
        }
      })
      .await?;

    match outcome {
      Upserted::Item(raw) => {
        let item = raw.into_item()?;
        debug!(%trip_id, item = %item.name, %artifact_id, "photo attached");
        self.changed();
        Ok(item)
      }
      Upserted::TripMissing => Err(deckhand_core::Error::TripNotFound(trip_id).into()),
      Upserted::ArtifactMissing(artifact_id) => {
        Err(deckhand_core::Error::ArtifactNotFound(artifact_id).into())
      }
    }
  }

  async fn get_report(&self, trip_id: Uuid) -> Result<Vec<ChecklistItem>> {
    let id = encode_uuid(trip_id);
    let rows = self
      .conn
      .call(move |conn| {
        if !trip_exists(conn, &id)? {
          return Ok(None);
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT {ITEM_COLUMNS} FROM checklist_items i
           LEFT JOIN users u ON u.user_id = i.completed_by_user_id
           WHERE i.trip_id = ?1
           ORDER BY i.category, i.name"
        ))?;
        let items = stmt
          .query_map([&id], RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT a.artifact_id, a.trip_id, a.item_id, a.filename, a.mime_type,
                  a.storage_ref, a.created_at
           FROM artifacts a JOIN checklist_items i ON i.item_id = a.item_id
           WHERE i.trip_id = ?1
           ORDER BY a.created_at, a.artifact_id",
        )?;
        let photos = stmt
          .query_map([&id], RawArtifact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((items, photos)))
      })
      .await?;

    let (raw_items, raw_photos) = rows.ok_or(deckhand_core::Error::TripNotFound(trip_id))?;

    let mut photos: HashMap<Uuid, Vec<Artifact>> = HashMap::new();
    for raw in raw_photos {
      let artifact = raw.into_artifact()?;
      if let Some(item_id) = artifact.item_id {
        photos.entry(item_id).or_default().push(artifact);
      }
    }

    raw_items
      .into_iter()
      .map(|raw| {
        let mut item = raw.into_item()?;
        item.photos = photos.remove(&item.item_id).unwrap_or_default();
        Ok(item)
      })
      .collect()
  }

  // ── Artifacts ─────────────────────────────────────────────────────────────

  async fn create_artifact(&self, input: NewArtifact) -> Result<Artifact> {
    let filename = input.filename.trim().to_owned();
    let storage_ref = input.storage_ref.trim().to_owned();
    if filename.is_empty() || storage_ref.is_empty() {
      return Err(
        deckhand_core::Error::Validation("artifact needs a filename and a storage ref".into())
          .into(),
      );
    }

    let trip_id = input.trip_id;
    let artifact_id = encode_uuid(Uuid::new_v4());
    let mime_type = non_blank(input.mime_type);
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let trip_str = trip_id.map(encode_uuid);
        if let (Some(trip), Some(id)) = (trip_id, &trip_str) {
          if !trip_exists(conn, id)? {
            return Ok(Err(trip));
          }
        }
        Ok(Ok(conn.query_row(
          &format!(
            "INSERT INTO artifacts (artifact_id, trip_id, filename, mime_type, storage_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {ARTIFACT_COLUMNS}"
          ),
          rusqlite::params![artifact_id, trip_str, filename, mime_type, storage_ref, now],
          RawArtifact::from_row,
        )?))
      })
      .await?
      .map_err(deckhand_core::Error::TripNotFound)?;

    let artifact = raw.into_artifact()?;
    self.changed();
    Ok(artifact)
  }

  async fn get_artifact(&self, artifact_id: Uuid) -> Result<Option<Artifact>> {
    let id = encode_uuid(artifact_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE artifact_id = ?1"),
              [id],
              RawArtifact::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawArtifact::into_artifact).transpose()
  }
}
