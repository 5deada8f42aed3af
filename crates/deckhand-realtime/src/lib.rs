//! Realtime fan-out for Deckhand.
//!
//! [`Hub`] owns channel membership and presence for connected clients and
//! authorises subscriptions against the store. [`Listener`] follows the
//! store's change feed and publishes each change as a hint on the owning
//! trip's channel. Both are plain values with explicit lifecycles; nothing
//! here is global.

pub mod error;
pub mod hub;
pub mod identity;
pub mod listener;

pub use error::{HubError, ListenerError};
pub use hub::{Hub, HubConfig, Publication, Publish, Subscription};
pub use identity::{ClientInfo, Identity};
pub use listener::{Listener, ListenerConfig, ListenerHandle, ListenerState};
