//! Change-capture listener.
//!
//! ```text
//! Disconnected ──connect──▶ Listening ──error──▶ Disconnected ──backoff──▶ …
//! ```
//!
//! Runs as one spawned task until [`ListenerHandle::stop`]. Feed failures are
//! logged and retried with exponential backoff; they never reach request
//! handlers. The feed cursor survives reconnects, so a change is published
//! at least once.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use deckhand_core::{
  event::{ChangeEvent, DEFAULT_MAX_PAYLOAD_BYTES, RawChange},
  store::{ChangeFeed, ChangeStream},
};

use crate::{ListenerError, Publish};

#[derive(Debug, Clone)]
pub struct ListenerConfig {
  pub connect_timeout:   Duration,
  pub backoff_initial:   Duration,
  pub backoff_max:       Duration,
  /// Events larger than this are replaced by a truncated marker.
  pub max_payload_bytes: usize,
}

impl Default for ListenerConfig {
  fn default() -> Self {
    Self {
      connect_timeout:   Duration::from_secs(5),
      backoff_initial:   Duration::from_millis(500),
      backoff_max:       Duration::from_secs(30),
      max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
  Disconnected,
  Listening,
}

pub struct Listener<F, P> {
  feed:      F,
  publisher: Arc<P>,
  config:    ListenerConfig,
}

/// Owner of a running listener task.
pub struct ListenerHandle {
  stop:  watch::Sender<bool>,
  state: watch::Receiver<ListenerState>,
  task:  JoinHandle<()>,
}

impl ListenerHandle {
  /// Observe state transitions.
  pub fn state(&self) -> watch::Receiver<ListenerState> { self.state.clone() }

  /// Signal the task and wait for it to finish.
  pub async fn stop(self) {
    let _ = self.stop.send(true);
    if let Err(e) = self.task.await {
      warn!(error = %e, "listener task ended abnormally");
    }
  }
}

/// Doubles `current`, capped at `max`.
fn next_backoff(current: Duration, max: Duration) -> Duration { current.saturating_mul(2).min(max) }

impl<F, P> Listener<F, P>
where
  F: ChangeFeed + 'static,
  P: Publish + 'static,
{
  pub fn new(feed: F, publisher: Arc<P>, config: ListenerConfig) -> Self {
    Self { feed, publisher, config }
  }

  pub fn spawn(self) -> ListenerHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(ListenerState::Disconnected);
    let task = tokio::spawn(self.run(stop_rx, state_tx));
    ListenerHandle { stop: stop_tx, state: state_rx, task }
  }

  async fn run(self, mut stop: watch::Receiver<bool>, state: watch::Sender<ListenerState>) {
    let mut cursor: Option<i64> = None;
    let mut backoff = self.config.backoff_initial;

    info!("change listener started");
    while !*stop.borrow() {
      let outcome = tokio::select! {
        _ = stop.changed() => break,
        outcome = self.session(&mut cursor, &state, &mut backoff) => outcome,
      };
      let _ = state.send(ListenerState::Disconnected);
      warn!(error = %outcome, retry_in = ?backoff, "change listener disconnected");

      tokio::select! {
        _ = stop.changed() => break,
        _ = tokio::time::sleep(backoff) => {}
      }
      backoff = next_backoff(backoff, self.config.backoff_max);
    }

    let _ = state.send(ListenerState::Disconnected);
    info!("change listener stopped");
  }

  /// Connect and forward changes until the feed fails.
  async fn session(
    &self,
    cursor: &mut Option<i64>,
    state: &watch::Sender<ListenerState>,
    backoff: &mut Duration,
  ) -> ListenerError {
    let connect = tokio::time::timeout(self.config.connect_timeout, self.feed.connect(*cursor));
    let mut stream = match connect.await {
      Ok(Ok(stream)) => stream,
      Ok(Err(e)) => return ListenerError::Connect(Box::new(e)),
      Err(_) => return ListenerError::ConnectTimeout(self.config.connect_timeout),
    };

    *backoff = self.config.backoff_initial;
    let _ = state.send(ListenerState::Listening);
    info!(resume_after = ?cursor, "change listener listening");

    loop {
      match stream.next_batch().await {
        Ok(batch) => {
          for change in batch {
            self.dispatch(&change);
            *cursor = Some(change.seq);
          }
        }
        Err(e) => return ListenerError::Stream(Box::new(e)),
      }
    }
  }

  /// Validate one change and publish it on its trip channel.
  fn dispatch(&self, change: &RawChange) {
    let event = match ChangeEvent::parse(&change.payload) {
      Ok(event) => event,
      Err(e) => {
        warn!(seq = change.seq, error = %e, "dropping malformed change");
        return;
      }
    };

    if event.channel().is_none() {
      debug!(seq = change.seq, table = event.table.as_str(), "change without trip id discarded");
      return;
    }

    match event.encode(self.config.max_payload_bytes) {
      Ok(encoded) => {
        if encoded.truncated {
          debug!(seq = change.seq, channel = %encoded.channel, "oversized change truncated");
        }
        let delivered = self.publisher.publish(&encoded.channel, Bytes::from(encoded.bytes));
        debug!(seq = change.seq, channel = %encoded.channel, delivered, "change published");
      }
      Err(e) => warn!(seq = change.seq, error = %e, "change could not be encoded"),
    }
  }
}
