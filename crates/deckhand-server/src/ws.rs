//! WebSocket transport for hub subscriptions.
//!
//! JSON text frames. Clients send `{"method": ..}` commands; the server
//! answers and pushes events tagged by `"type"`. Each connection runs one
//! task that owns the socket; every subscription gets a forwarder task that
//! turns hub publications into frames on the connection's outbound queue.

use std::collections::HashMap;

use axum::{
  extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use deckhand_api::Caller;
use deckhand_core::{store::ChecklistStore, user::Principal};
use deckhand_realtime::{ClientInfo, Hub, HubError, Identity, Publication, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tokio::{
  sync::{mpsc, watch},
  task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;

/// Outbound frames buffered per connection before forwarders wait.
const OUTBOUND_CAPACITY: usize = 64;

// ─── Frames ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ClientFrame {
  Subscribe { channel: String },
  Unsubscribe { channel: String },
  Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
  Connected {
    client: Uuid,
  },
  Subscribed {
    channel:  String,
    presence: Vec<ClientInfo>,
  },
  Unsubscribed {
    channel: String,
  },
  Error {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    code:    &'static str,
    message: String,
  },
  /// `data` is the listener's event, passed through verbatim.
  Publication {
    channel: String,
    data:    Box<RawValue>,
  },
  Join {
    channel: String,
    info:    ClientInfo,
  },
  Leave {
    channel: String,
    info:    ClientInfo,
  },
  /// Hints were dropped for this subscriber; re-fetch state.
  Resync {
    channel: String,
  },
  Pong,
}

impl ServerFrame {
  fn error(channel: Option<&str>, code: &'static str, message: impl Into<String>) -> Self {
    ServerFrame::Error {
      channel: channel.map(str::to_owned),
      code,
      message: message.into(),
    }
  }

  /// Translate a hub publication. Payloads that are not JSON are dropped.
  fn from_publication(channel: &str, publication: Publication) -> Option<Self> {
    let channel = channel.to_owned();
    Some(match publication {
      Publication::Data(bytes) => match serde_json::from_slice::<Box<RawValue>>(&bytes) {
        Ok(data) => ServerFrame::Publication { channel, data },
        Err(e) => {
          warn!(%channel, error = %e, "dropping non-JSON publication");
          return None;
        }
      },
      Publication::Join(info) => ServerFrame::Join { channel, info },
      Publication::Leave(info) => ServerFrame::Leave { channel, info },
      Publication::Resync { .. } => ServerFrame::Resync { channel },
    })
  }
}

// ─── Connection ───────────────────────────────────────────────────────────────

/// Subscriptions of one socket.
pub struct Connection<S> {
  hub:        Hub<S>,
  identity:   Identity,
  out:        mpsc::Sender<ServerFrame>,
  forwarders: HashMap<String, JoinHandle<()>>,
}

impl<S: ChecklistStore + 'static> Connection<S> {
  pub async fn open(hub: Hub<S>, principal: &Principal, out: mpsc::Sender<ServerFrame>) -> Self {
    let identity = hub.connect(principal).await;
    Self { hub, identity, out, forwarders: HashMap::new() }
  }

  /// Apply one client command and return the direct reply.
  pub async fn handle(&mut self, frame: ClientFrame) -> ServerFrame {
    match frame {
      ClientFrame::Ping => ServerFrame::Pong,
      ClientFrame::Subscribe { channel } => self.subscribe(channel).await,
      ClientFrame::Unsubscribe { channel } => match self.forwarders.remove(&channel) {
        Some(task) => {
          stop(task).await;
          debug!(%channel, "unsubscribed");
          ServerFrame::Unsubscribed { channel }
        }
        None => ServerFrame::error(Some(&channel), "not_subscribed", "not subscribed"),
      },
    }
  }

  async fn subscribe(&mut self, channel: String) -> ServerFrame {
    if self.forwarders.contains_key(&channel) {
      return ServerFrame::error(Some(&channel), "already_subscribed", "already subscribed");
    }
    match self.hub.subscribe(&self.identity, &channel).await {
      Ok(subscription) => {
        let presence = subscription.presence().to_vec();
        let task = tokio::spawn(forward(subscription, self.out.clone()));
        self.forwarders.insert(channel.clone(), task);
        ServerFrame::Subscribed { channel, presence }
      }
      Err(e @ HubError::PermissionDenied(_)) => {
        ServerFrame::error(Some(&channel), "permission_denied", e.to_string())
      }
      Err(e @ HubError::Closed) => ServerFrame::error(Some(&channel), "closed", e.to_string()),
    }
  }

  /// Drop every subscription, removing this connection from presence.
  pub async fn close(mut self) {
    for (_, task) in self.forwarders.drain() {
      stop(task).await;
    }
  }
}

/// Abort a forwarder and wait until its subscription is dropped.
async fn stop(task: JoinHandle<()>) {
  task.abort();
  let _ = task.await;
}

async fn forward(mut subscription: Subscription, out: mpsc::Sender<ServerFrame>) {
  while let Some(publication) = subscription.recv().await {
    let Some(frame) = ServerFrame::from_publication(subscription.channel(), publication) else {
      continue;
    };
    if out.send(frame).await.is_err() {
      break;
    }
  }
}

// ─── Socket ───────────────────────────────────────────────────────────────────

/// `GET /connection/websocket`
pub async fn upgrade<S>(
  State(state): State<AppState<S>>,
  Caller(principal): Caller,
  ws: WebSocketUpgrade,
) -> Response
where
  S: ChecklistStore + 'static,
{
  ws.on_upgrade(move |socket| serve(socket, state.hub, principal, state.shutdown))
}

async fn serve<S>(
  mut socket: WebSocket,
  hub: Hub<S>,
  principal: Principal,
  mut shutdown: watch::Receiver<bool>,
) where
  S: ChecklistStore + 'static,
{
  let client = Uuid::new_v4();
  let (out_tx, mut out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
  let mut conn = Connection::open(hub, &principal, out_tx).await;
  info!(%client, user = ?conn.identity.key(), "websocket connected");

  if send(&mut socket, &ServerFrame::Connected { client }).await.is_err() {
    conn.close().await;
    return;
  }

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let reply = match incoming {
          Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(frame) => conn.handle(frame).await,
            Err(e) => ServerFrame::error(None, "bad_request", e.to_string()),
          },
          Some(Ok(Message::Binary(_))) => {
            ServerFrame::error(None, "bad_request", "binary frames are not supported")
          }
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(_)) => continue,
          Some(Err(e)) => {
            debug!(%client, error = %e, "websocket read failed");
            break;
          }
        };
        if send(&mut socket, &reply).await.is_err() {
          break;
        }
      }
      Some(frame) = out_rx.recv() => {
        if send(&mut socket, &frame).await.is_err() {
          break;
        }
      }
      _ = shutdown.changed() => {
        let _ = socket.send(Message::Close(None)).await;
        break;
      }
    }
  }

  conn.close().await;
  info!(%client, "websocket disconnected");
}

async fn send(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
  let text = match serde_json::to_string(frame) {
    Ok(text) => text,
    Err(e) => {
      warn!(error = %e, "unserialisable frame");
      return Ok(());
    }
  };
  socket.send(Message::Text(text.into())).await
}
