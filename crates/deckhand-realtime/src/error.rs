//! Error types for `deckhand-realtime`.

use std::time::Duration;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
  /// The channel is malformed, or its trip does not exist or could not be
  /// verified. The cases are indistinguishable on purpose.
  #[error("permission denied for channel {0:?}")]
  PermissionDenied(String),

  #[error("hub is shut down")]
  Closed,
}

/// Reasons the listener dropped back to `Disconnected`. Logged, never
/// returned to request handlers.
#[derive(Debug, Error)]
pub enum ListenerError {
  #[error("change feed connect failed: {0}")]
  Connect(#[source] BoxError),

  #[error("change feed connect timed out after {0:?}")]
  ConnectTimeout(Duration),

  #[error("change feed stream failed: {0}")]
  Stream(#[source] BoxError),
}
