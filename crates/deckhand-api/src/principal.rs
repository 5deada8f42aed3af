//! Caller identity, as asserted by the auth layer in front of the API.

use std::convert::Infallible;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use deckhand_core::user::Principal;

/// Registered user id set by the auth proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Display name of an unauthenticated guest.
pub const GUEST_NAME_HEADER: &str = "x-guest-name";

/// Extractor wrapping the request's [`Principal`]. Never rejects: a request
/// without identity headers is [`Principal::Anonymous`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Principal);

impl Caller {
  pub fn from_headers(headers: &HeaderMap) -> Self {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    Caller(Principal::from_parts(get(USER_ID_HEADER), get(GUEST_NAME_HEADER)))
  }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    Ok(Caller::from_headers(&parts.headers))
  }
}
