//! [`SqliteChangeFeed`] — reads the trigger-populated `change_log` table.
//!
//! The store raises an in-process wake signal after every committed write;
//! the stream also polls at a fixed interval so writes from other processes
//! sharing the database file are picked up too.

use std::{path::PathBuf, sync::Arc, time::Duration};

use rusqlite::OptionalExtension as _;
use tokio::sync::Notify;
use tracing::{debug, trace};

use deckhand_core::{
  event::RawChange,
  store::{ChangeFeed, ChangeStream},
};

use crate::{Error, Result, SqliteStore};

/// Rows older than this many entries behind the cursor are deleted.
pub const RETENTION: i64 = 1024;

/// Upper bound on rows returned by one [`ChangeStream::next_batch`].
const BATCH_LIMIT: i64 = 256;

#[derive(Clone)]
enum Source {
  /// In-memory databases cannot be reopened; share the store's connection.
  Shared(tokio_rusqlite::Connection),
  File(PathBuf),
}

/// Change feed over a [`SqliteStore`]'s database.
#[derive(Clone)]
pub struct SqliteChangeFeed {
  source:        Source,
  wake:          Arc<Notify>,
  poll_interval: Duration,
}

impl SqliteStore {
  /// A change feed for this store. File-backed stores get a dedicated
  /// connection per [`ChangeFeed::connect`].
  pub fn change_feed(&self, poll_interval: Duration) -> SqliteChangeFeed {
    let source = match &self.path {
      Some(path) => Source::File(path.clone()),
      None => Source::Shared(self.conn.clone()),
    };
    SqliteChangeFeed { source, wake: Arc::clone(&self.wake), poll_interval }
  }
}

impl ChangeFeed for SqliteChangeFeed {
  type Error = Error;
  type Stream = SqliteChangeStream;

  async fn connect(&self, resume_after: Option<i64>) -> Result<SqliteChangeStream> {
    let conn = match &self.source {
      Source::Shared(conn) => conn.clone(),
      Source::File(path) => {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        conn
          .call(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(())
          })
          .await?;
        conn
      }
    };

    let head: i64 = conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM change_log", [], |r| r.get(0))?)
      })
      .await?;

    // A cursor past the head means the log was reset; start over from it.
    let cursor = match resume_after {
      Some(seq) if seq <= head => seq,
      _ => head,
    };
    debug!(cursor, head, "change feed connected");

    Ok(SqliteChangeStream {
      conn,
      cursor,
      wake: Arc::clone(&self.wake),
      poll_interval: self.poll_interval,
    })
  }
}

/// A positioned reader over `change_log`.
pub struct SqliteChangeStream {
  conn:          tokio_rusqlite::Connection,
  cursor:        i64,
  wake:          Arc<Notify>,
  poll_interval: Duration,
}

impl SqliteChangeStream {
  /// The last sequence number handed out.
  pub fn cursor(&self) -> i64 { self.cursor }

  async fn fetch(&self) -> Result<Vec<RawChange>> {
    let cursor = self.cursor;
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT seq, payload FROM change_log WHERE seq > ?1 ORDER BY seq LIMIT ?2",
        )?;
        let rows = stmt
          .query_map([cursor, BATCH_LIMIT], |r| {
            Ok(RawChange { seq: r.get(0)?, payload: r.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn prune(&self) -> Result<()> {
    let floor = self.cursor - RETENTION;
    if floor <= 0 {
      return Ok(());
    }
    let removed = self
      .conn
      .call(move |conn| {
        // Only prune when something is actually behind the window.
        let oldest: Option<i64> = conn
          .query_row("SELECT MIN(seq) FROM change_log", [], |r| r.get(0))
          .optional()?
          .flatten();
        if oldest.is_none_or(|seq| seq > floor) {
          return Ok(0);
        }
        Ok(conn.execute("DELETE FROM change_log WHERE seq <= ?1", [floor])?)
      })
      .await?;
    if removed > 0 {
      trace!(removed, floor, "pruned change log");
    }
    Ok(())
  }
}

impl ChangeStream for SqliteChangeStream {
  type Error = Error;

  async fn next_batch(&mut self) -> Result<Vec<RawChange>> {
    loop {
      let rows = self.fetch().await?;
      if let Some(last) = rows.last() {
        self.cursor = last.seq;
        self.prune().await?;
        return Ok(rows);
      }

      tokio::select! {
        _ = self.wake.notified() => {}
        _ = tokio::time::sleep(self.poll_interval) => {}
      }
    }
  }
}
