//! Error types for `deckhand-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("trip not found: {0}")]
  TripNotFound(Uuid),

  #[error("trip not found for session {0:?}")]
  SessionNotFound(String),

  #[error("artifact not found: {0}")]
  ArtifactNotFound(Uuid),

  #[error("validation error: {0}")]
  Validation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse category of a failure, used by transports to pick a status code
/// and by the tool bridge to report per-item outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A trip, item, artifact or user is absent.
  NotFound,
  /// The caller supplied malformed input.
  Validation,
  /// The backend is momentarily unavailable (locked, busy, disconnected).
  /// Surfaced to the caller; retry is the caller's decision.
  Transient,
  Internal,
}

/// Implemented by every store error so callers can branch on the category
/// without knowing the backend.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::TripNotFound(_)
      | Error::SessionNotFound(_)
      | Error::ArtifactNotFound(_) => ErrorKind::NotFound,
      Error::Validation(_) => ErrorKind::Validation,
      Error::Serialization(_) => ErrorKind::Internal,
    }
  }
}
