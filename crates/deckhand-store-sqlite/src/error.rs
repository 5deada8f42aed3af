//! Error type for `deckhand-store-sqlite`.

use deckhand_core::{Classify, ErrorKind};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] deckhand_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column holds a value this build does not know.
  #[error("corrupt column {column}: {value:?}")]
  Corrupt { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database(e) => database_kind(e),
      Error::Json(_) | Error::Uuid(_) | Error::DateParse(_) | Error::Corrupt { .. } => {
        ErrorKind::Internal
      }
    }
  }
}

/// Lock contention and a closed connection clear up on their own.
fn database_kind(e: &tokio_rusqlite::Error) -> ErrorKind {
  match e {
    tokio_rusqlite::Error::ConnectionClosed => ErrorKind::Transient,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
      if matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
    {
      ErrorKind::Transient
    }
    _ => ErrorKind::Internal,
  }
}
