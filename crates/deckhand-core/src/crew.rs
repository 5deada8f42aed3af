//! Crew name resolution.
//!
//! Spoken or typed names are noisy, so assignment targets are resolved
//! against the trip's trusted crew set:
//!
//! 1. an exact case-insensitive match wins;
//! 2. otherwise the first case-insensitive substring match, in alphabetical
//!    order;
//! 3. otherwise nothing matches, and the caller records the literal name with
//!    `matched = false` so the user can be warned.

use serde::{Deserialize, Serialize};

/// Outcome of resolving a free-text name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
  /// The crew member's canonical name, or the trimmed input when unmatched.
  pub name:    String,
  pub matched: bool,
}

/// Sort a crew set into resolution order and drop blanks and duplicates.
pub fn normalize<I>(names: I) -> Vec<String>
where
  I: IntoIterator<Item = String>,
{
  let mut crew: Vec<String> = names
    .into_iter()
    .map(|n| n.trim().to_owned())
    .filter(|n| !n.is_empty())
    .collect();
  crew.sort_by(|a, b| {
    a.to_lowercase()
      .cmp(&b.to_lowercase())
      .then_with(|| a.cmp(b))
  });
  crew.dedup();
  crew
}

/// The crew member `query` refers to, if any.
///
/// `crew` need not be sorted; ties are broken alphabetically either way.
pub fn best_match<'a>(crew: &'a [String], query: &str) -> Option<&'a str> {
  let needle = query.trim().to_lowercase();
  if needle.is_empty() {
    return None;
  }

  let mut ordered: Vec<&'a String> = crew.iter().filter(|n| !n.trim().is_empty()).collect();
  ordered.sort_by(|a, b| {
    a.to_lowercase()
      .cmp(&b.to_lowercase())
      .then_with(|| a.cmp(b))
  });

  ordered
    .iter()
    .find(|n| n.trim().to_lowercase() == needle)
    .or_else(|| ordered.iter().find(|n| n.to_lowercase().contains(&needle)))
    .map(|n| n.trim())
}

/// Resolve `query` against `crew`, keeping the literal input when nothing
/// matches.
pub fn resolve(crew: &[String], query: &str) -> Resolution {
  match best_match(crew, query) {
    Some(name) => Resolution { name: name.to_owned(), matched: true },
    None => Resolution { name: query.trim().to_owned(), matched: false },
  }
}
