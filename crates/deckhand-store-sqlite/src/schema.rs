//! SQL schema for the Deckhand SQLite store.
//!
//! Executed once at connection startup. Tables are created with
//! `IF NOT EXISTS`; change-capture triggers are generated from
//! [`TRACKED`] so the captured columns cannot drift from the table list.

/// Table DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
const TABLES: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

-- Registered users, maintained by the auth layer.
CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    name        TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trips (
    trip_id       TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL UNIQUE,
    user_id       TEXT,
    boat_name     TEXT,
    captain_name  TEXT,
    trip_type     TEXT NOT NULL DEFAULT 'Departing',
    status        TEXT NOT NULL DEFAULT 'Draft',
    created_at    TEXT NOT NULL
);

-- Explicit joins; one row per (trip, user).
CREATE TABLE IF NOT EXISTS trip_crew (
    trip_id       TEXT NOT NULL REFERENCES trips(trip_id) ON DELETE CASCADE,
    user_id       TEXT NOT NULL,
    display_name  TEXT NOT NULL,
    joined_at     TEXT NOT NULL,
    PRIMARY KEY (trip_id, user_id)
);

-- (trip_id, name) is the upsert key.
CREATE TABLE IF NOT EXISTS checklist_items (
    item_id               TEXT PRIMARY KEY,
    trip_id               TEXT NOT NULL REFERENCES trips(trip_id) ON DELETE CASCADE,
    category              TEXT NOT NULL,
    name                  TEXT NOT NULL,
    item_type             TEXT NOT NULL DEFAULT 'checkbox',
    is_checked            INTEGER NOT NULL DEFAULT 0,
    count_value           INTEGER NOT NULL DEFAULT 0,
    location_text         TEXT,
    flagged_issue         TEXT,
    completed_by_user_id  TEXT,
    completed_by_name     TEXT,
    assigned_to_user_id   TEXT,
    assigned_to_name      TEXT,
    updated_at            TEXT NOT NULL,
    UNIQUE (trip_id, name)
);

CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id  TEXT PRIMARY KEY,
    trip_id      TEXT REFERENCES trips(trip_id) ON DELETE CASCADE,
    item_id      TEXT REFERENCES checklist_items(item_id) ON DELETE SET NULL,
    filename     TEXT NOT NULL,
    mime_type    TEXT,
    storage_ref  TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

-- Append-only change feed written by triggers. The reader prunes behind
-- its cursor; the cap trigger bounds it when nothing reads.
CREATE TABLE IF NOT EXISTS change_log (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    payload      TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS trips_user_idx      ON trips(user_id);
CREATE INDEX IF NOT EXISTS crew_user_idx       ON trip_crew(user_id);
CREATE INDEX IF NOT EXISTS artifacts_item_idx  ON artifacts(item_id);
CREATE INDEX IF NOT EXISTS artifacts_trip_idx  ON artifacts(trip_id);
CREATE INDEX IF NOT EXISTS users_name_idx      ON users(name COLLATE NOCASE);
";

/// Most rows `change_log` keeps regardless of readers. Well above the
/// listener's retention window.
pub const LOG_CAP: i64 = 8192;

/// Drops the oldest feed rows once the log grows past [`LOG_CAP`].
fn log_cap_trigger() -> String {
  format!(
    "CREATE TRIGGER IF NOT EXISTS change_log_cap AFTER INSERT ON change_log
WHEN NEW.seq > {LOG_CAP}
BEGIN
    DELETE FROM change_log WHERE seq <= NEW.seq - {LOG_CAP};
END;
"
  )
}

/// A table whose row changes are published.
struct Tracked {
  table:   &'static str,
  /// The `table` field of the emitted event.
  event:   &'static str,
  columns: &'static [&'static str],
}

const TRACKED: [Tracked; 3] = [
  Tracked {
    table:   "trips",
    event:   "trip",
    columns: &[
      "trip_id", "session_id", "user_id", "boat_name", "captain_name",
      "trip_type", "status", "created_at",
    ],
  },
  Tracked {
    table:   "checklist_items",
    event:   "checklist_item",
    columns: &[
      "item_id", "trip_id", "category", "name", "item_type", "is_checked",
      "count_value", "location_text", "flagged_issue", "completed_by_user_id",
      "completed_by_name", "assigned_to_user_id", "assigned_to_name",
      "updated_at",
    ],
  },
  Tracked {
    table:   "artifacts",
    event:   "artifact",
    columns: &[
      "artifact_id", "trip_id", "item_id", "filename", "mime_type",
      "storage_ref", "created_at",
    ],
  },
];

/// One `AFTER` trigger per tracked table and action. Deletes read `OLD` so
/// the trip id survives the row.
fn change_triggers() -> String {
  let mut sql = String::new();
  for t in &TRACKED {
    for (action, row) in [("INSERT", "NEW"), ("UPDATE", "NEW"), ("DELETE", "OLD")] {
      let data = t
        .columns
        .iter()
        .map(|c| format!("'{c}', {row}.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
      sql.push_str(&format!(
        "CREATE TRIGGER IF NOT EXISTS {table}_{lower}_change AFTER {action} ON {table}
BEGIN
    INSERT INTO change_log (payload, recorded_at) VALUES (
        json_object('table', '{event}', 'action', '{action}', 'trip_id', {row}.trip_id,
                    'data', json_object({data})),
        strftime('%Y-%m-%dT%H:%M:%fZ', 'now'));
END;
",
        table = t.table,
        lower = action.to_ascii_lowercase(),
        event = t.event,
      ));
    }
  }
  sql
}

/// Full schema DDL, ending with the schema version stamp.
pub fn ddl() -> String {
  format!(
    "{TABLES}\n{}\n{}\nPRAGMA user_version = 1;\n",
    change_triggers(),
    log_cap_trigger()
  )
}
