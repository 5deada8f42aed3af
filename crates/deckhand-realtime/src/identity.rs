//! Connection identities.

use serde::{Deserialize, Serialize};

/// The minimal payload carried in presence and join/leave events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientInfo {
  pub user_id: String,
  pub name:    String,
}

/// A resolved connection identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
  /// May subscribe and receive publications but has no presence entry.
  #[default]
  Anonymous,
  Guest(ClientInfo),
  Registered(ClientInfo),
}

impl Identity {
  pub fn info(&self) -> Option<&ClientInfo> {
    match self {
      Identity::Anonymous => None,
      Identity::Guest(info) | Identity::Registered(info) => Some(info),
    }
  }

  /// Presence key. Several connections of one identity share it.
  pub fn key(&self) -> Option<&str> { self.info().map(|i| i.user_id.as_str()) }
}
