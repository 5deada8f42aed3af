//! Users and caller identities.
//!
//! Registered users are created by the external auth layer. Guests have no
//! row; their id is derived from the display name they supply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix that keeps guest ids out of the registered id space.
pub const GUEST_PREFIX: &str = "guest_";

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    String,
  pub name:       Option<String>,
  pub created_at: DateTime<Utc>,
}

impl User {
  /// Name to show for this user; falls back to the id.
  pub fn display_name(&self) -> &str {
    self
      .name
      .as_deref()
      .filter(|n| !n.is_empty())
      .unwrap_or(&self.user_id)
  }
}

/// Deterministic guest id for a display name. Idempotent: an already
/// prefixed name is not prefixed twice.
pub fn guest_id(display_name: &str) -> String {
  format!("{GUEST_PREFIX}{}", guest_name(display_name))
}

/// The display name with any guest prefix removed.
pub fn guest_name(display_name: &str) -> &str {
  display_name
    .strip_prefix(GUEST_PREFIX)
    .unwrap_or(display_name)
}

pub fn is_guest_id(user_id: &str) -> bool { user_id.starts_with(GUEST_PREFIX) }

/// Who is making a request, as asserted by the auth layer in front of us.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Principal {
  #[default]
  Anonymous,
  Guest {
    name: String,
  },
  Registered {
    user_id: String,
  },
}

impl Principal {
  /// A registered id wins over a guest name; blank values are ignored.
  pub fn from_parts(user_id: Option<&str>, guest: Option<&str>) -> Self {
    let user_id = user_id.map(str::trim).filter(|s| !s.is_empty());
    let guest = guest
      .map(str::trim)
      .map(guest_name)
      .filter(|s| !s.is_empty());
    match (user_id, guest) {
      (Some(id), _) => Principal::Registered { user_id: id.to_owned() },
      (None, Some(name)) => Principal::Guest { name: name.to_owned() },
      (None, None) => Principal::Anonymous,
    }
  }

  /// The id recorded as the acting user on writes.
  pub fn acting_user_id(&self) -> Option<String> {
    match self {
      Principal::Anonymous => None,
      Principal::Guest { name } => Some(guest_id(name)),
      Principal::Registered { user_id } => Some(user_id.clone()),
    }
  }

  pub fn registered_id(&self) -> Option<&str> {
    match self {
      Principal::Registered { user_id } => Some(user_id),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn guest_ids_are_prefixed_once() {
    assert_eq!(guest_id("John"), "guest_John");
    assert_eq!(guest_id("guest_John"), "guest_John");
    assert!(is_guest_id(&guest_id("John")));
  }

  #[test]
  fn principal_prefers_registered_id() {
    assert_eq!(
      Principal::from_parts(Some("user_1"), Some("John")),
      Principal::Registered { user_id: "user_1".into() }
    );
    assert_eq!(
      Principal::from_parts(None, Some("guest_John")),
      Principal::Guest { name: "John".into() }
    );
    assert_eq!(Principal::from_parts(Some("  "), None), Principal::Anonymous);
  }

  #[test]
  fn display_name_falls_back_to_id() {
    let user = User { user_id: "user_456".into(), name: None, created_at: Utc::now() };
    assert_eq!(user.display_name(), "user_456");
  }
}
