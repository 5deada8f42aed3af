//! Channel-addressed pub/sub with subscribe-time authorisation and presence.
//!
//! Each `trip:{id}` channel is a [`tokio::sync::broadcast`] sender plus a
//! presence map keyed by identity. Publishing never blocks: a subscriber that
//! falls behind loses hints and is told to resync instead of slowing the
//! publisher down.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use deckhand_core::{
  store::ChecklistStore,
  trip::parse_channel,
  user::Principal,
};

use crate::{ClientInfo, HubError, Identity};

#[derive(Debug, Clone)]
pub struct HubConfig {
  /// Per-channel buffer; slower subscribers get [`Publication::Resync`].
  pub channel_capacity: usize,
}

impl Default for HubConfig {
  fn default() -> Self { Self { channel_capacity: 256 } }
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
  /// An opaque payload, passed through unmodified.
  Data(Bytes),
  Join(ClientInfo),
  Leave(ClientInfo),
  /// The subscriber lagged and `skipped` publications were dropped; it must
  /// re-fetch state.
  Resync { skipped: u64 },
}

/// Sink for channel payloads. Implemented by [`Hub`].
pub trait Publish: Send + Sync {
  /// Hand `payload` to every current subscriber of `channel`; returns how
  /// many received it. Never blocks.
  fn publish(&self, channel: &str, payload: Bytes) -> usize;
}

// ─── Registry ────────────────────────────────────────────────────────────────

struct Member {
  info:        ClientInfo,
  connections: usize,
}

struct Channel {
  tx:       broadcast::Sender<Publication>,
  presence: HashMap<String, Member>,
}

#[derive(Default)]
struct Channels {
  map:    HashMap<String, Channel>,
  closed: bool,
}

/// Shared state behind every [`Hub`] clone and live [`Subscription`].
struct Registry {
  channels: Mutex<Channels>,
  capacity: usize,
}

impl Registry {
  fn lock(&self) -> MutexGuard<'_, Channels> {
    self.channels.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a subscriber. The receiver is created after the join is
  /// broadcast, so the snapshot (which includes the subscriber) and the
  /// event stream never double count it.
  fn join(
    &self,
    channel: &str,
    identity: &Identity,
  ) -> Result<(broadcast::Receiver<Publication>, Vec<ClientInfo>), HubError> {
    let mut channels = self.lock();
    if channels.closed {
      return Err(HubError::Closed);
    }

    let entry = channels
      .map
      .entry(channel.to_owned())
      .or_insert_with(|| Channel {
        tx:       broadcast::channel(self.capacity).0,
        presence: HashMap::new(),
      });

    if let Some(info) = identity.info() {
      let member = entry
        .presence
        .entry(info.user_id.clone())
        .or_insert_with(|| Member { info: info.clone(), connections: 0 });
      member.connections += 1;
      if member.connections == 1 {
        let _ = entry.tx.send(Publication::Join(info.clone()));
      }
    }

    let rx = entry.tx.subscribe();
    Ok((rx, snapshot(&entry.presence)))
  }

  fn leave(&self, channel: &str, key: Option<&str>) {
    let mut channels = self.lock();
    let Some(entry) = channels.map.get_mut(channel) else {
      return;
    };

    if let Some(key) = key {
      if let Some(member) = entry.presence.get_mut(key) {
        member.connections = member.connections.saturating_sub(1);
        if member.connections == 0 {
          if let Some(gone) = entry.presence.remove(key) {
            let _ = entry.tx.send(Publication::Leave(gone.info));
          }
        }
      }
    }

    if entry.tx.receiver_count() == 0 && entry.presence.is_empty() {
      channels.map.remove(channel);
      debug!(channel, "channel dropped");
    }
  }
}

fn snapshot(presence: &HashMap<String, Member>) -> Vec<ClientInfo> {
  let mut infos: Vec<ClientInfo> = presence.values().map(|m| m.info.clone()).collect();
  infos.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.user_id.cmp(&b.user_id)));
  infos
}

// ─── Hub ─────────────────────────────────────────────────────────────────────

pub struct Hub<S> {
  store:    Arc<S>,
  registry: Arc<Registry>,
}

impl<S> Clone for Hub<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      registry: Arc::clone(&self.registry),
    }
  }
}

impl<S: ChecklistStore> Hub<S> {
  pub fn new(store: Arc<S>, config: HubConfig) -> Self {
    Self {
      store,
      registry: Arc::new(Registry {
        channels: Mutex::new(Channels::default()),
        capacity: config.channel_capacity.max(1),
      }),
    }
  }

  /// Resolve the identity of a new connection. Registered users carry their
  /// current name, falling back to the id when it cannot be read.
  pub async fn connect(&self, principal: &Principal) -> Identity {
    match principal {
      Principal::Anonymous => Identity::Anonymous,
      Principal::Guest { name } => Identity::Guest(ClientInfo {
        user_id: principal.acting_user_id().unwrap_or_default(),
        name:    name.clone(),
      }),
      Principal::Registered { user_id } => {
        let name = match self.store.get_user(user_id.clone()).await {
          Ok(Some(user)) => user.display_name().to_owned(),
          Ok(None) => user_id.clone(),
          Err(e) => {
            warn!(%user_id, error = %e, "user lookup failed on connect");
            user_id.clone()
          }
        };
        Identity::Registered(ClientInfo { user_id: user_id.clone(), name })
      }
    }
  }

  /// Authorise and register a subscription. Unknown, malformed and
  /// unverifiable channels are all denied the same way.
  pub async fn subscribe(&self, identity: &Identity, channel: &str) -> Result<Subscription, HubError> {
    let denied = || HubError::PermissionDenied(channel.to_owned());

    let trip_id = parse_channel(channel).ok_or_else(denied)?;
    match self.store.get_trip(trip_id).await {
      Ok(Some(_)) => {}
      Ok(None) => {
        debug!(channel, "subscribe denied, no such trip");
        return Err(denied());
      }
      Err(e) => {
        warn!(channel, error = %e, "subscribe denied, trip lookup failed");
        return Err(denied());
      }
    }

    let (rx, presence) = self.registry.join(channel, identity)?;
    debug!(channel, user = ?identity.key(), "subscribed");
    Ok(Subscription {
      channel: channel.to_owned(),
      key: identity.key().map(str::to_owned),
      rx: Some(rx),
      presence,
      registry: Arc::clone(&self.registry),
    })
  }

  /// Current presence of `channel`, sorted by name.
  pub fn presence(&self, channel: &str) -> Vec<ClientInfo> {
    self
      .registry
      .lock()
      .map
      .get(channel)
      .map(|c| snapshot(&c.presence))
      .unwrap_or_default()
  }

  /// Close every channel. Live subscriptions observe the end of their
  /// stream; later subscribes fail with [`HubError::Closed`].
  pub fn shutdown(&self) {
    let mut channels = self.registry.lock();
    channels.closed = true;
    let count = channels.map.len();
    channels.map.clear();
    info!(channels = count, "hub shut down");
  }
}

impl<S: ChecklistStore> Publish for Hub<S> {
  fn publish(&self, channel: &str, payload: Bytes) -> usize {
    let channels = self.registry.lock();
    match channels.map.get(channel) {
      Some(c) => c.tx.send(Publication::Data(payload)).unwrap_or(0),
      None => 0,
    }
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// A live channel membership. Dropping it leaves the channel.
pub struct Subscription {
  channel:  String,
  key:      Option<String>,
  rx:       Option<broadcast::Receiver<Publication>>,
  presence: Vec<ClientInfo>,
  registry: Arc<Registry>,
}

impl Subscription {
  pub fn channel(&self) -> &str { &self.channel }

  /// Presence at the moment of subscribing, including this subscriber.
  pub fn presence(&self) -> &[ClientInfo] { &self.presence }

  /// Next publication, or `None` once the hub has shut down.
  pub async fn recv(&mut self) -> Option<Publication> {
    let rx = self.rx.as_mut()?;
    match rx.recv().await {
      Ok(p) => Some(p),
      Err(broadcast::error::RecvError::Lagged(skipped)) => {
        warn!(channel = %self.channel, skipped, "subscriber lagged");
        Some(Publication::Resync { skipped })
      }
      Err(broadcast::error::RecvError::Closed) => None,
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    drop(self.rx.take());
    self.registry.leave(&self.channel, self.key.as_deref());
  }
}
