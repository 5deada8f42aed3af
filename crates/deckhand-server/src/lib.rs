//! Deckhand server: configuration, routing and the realtime transport.
//!
//! The REST surface lives in [`deckhand_api`]; this crate adds `/healthz`,
//! the WebSocket endpoint backed by a [`Hub`], HTTP tracing, and the
//! [`session::HttpSessionState`] client for the external assistant-session
//! service.

pub mod session;
pub mod ws;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use deckhand_api::ApiState;
use deckhand_core::{event::DEFAULT_MAX_PAYLOAD_BYTES, store::ChecklistStore};
use deckhand_realtime::{Hub, HubConfig, ListenerConfig};
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `DECKHAND_*` environment variables. Every key has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  /// SQLite database file; `:memory:` for a throwaway store.
  pub store_path:      PathBuf,
  pub listener:        ListenerSettings,
  pub hub:             HubSettings,
  pub session_service: SessionServiceSettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_string(),
      port:            8080,
      store_path:      PathBuf::from("deckhand.db"),
      listener:        ListenerSettings::default(),
      hub:             HubSettings::default(),
      session_service: SessionServiceSettings::default(),
    }
  }
}

impl ServerConfig {
  pub fn is_in_memory(&self) -> bool { self.store_path.as_os_str() == ":memory:" }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ListenerSettings {
  pub poll_interval_ms:   u64,
  pub connect_timeout_ms: u64,
  pub backoff_initial_ms: u64,
  pub backoff_max_ms:     u64,
  pub max_payload_bytes:  usize,
}

impl Default for ListenerSettings {
  fn default() -> Self {
    Self {
      poll_interval_ms:   250,
      connect_timeout_ms: 5_000,
      backoff_initial_ms: 500,
      backoff_max_ms:     30_000,
      max_payload_bytes:  DEFAULT_MAX_PAYLOAD_BYTES,
    }
  }
}

impl ListenerSettings {
  pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms.max(1)) }

  pub fn listener_config(&self) -> ListenerConfig {
    ListenerConfig {
      connect_timeout:   Duration::from_millis(self.connect_timeout_ms),
      backoff_initial:   Duration::from_millis(self.backoff_initial_ms),
      backoff_max:       Duration::from_millis(self.backoff_max_ms.max(self.backoff_initial_ms)),
      max_payload_bytes: self.max_payload_bytes,
    }
  }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HubSettings {
  pub channel_capacity: usize,
}

impl Default for HubSettings {
  fn default() -> Self { Self { channel_capacity: HubConfig::default().channel_capacity } }
}

impl HubSettings {
  pub fn hub_config(&self) -> HubConfig { HubConfig { channel_capacity: self.channel_capacity } }
}

/// Where per-user assistant session state is fetched from. No state is
/// merged while `base_url` is unset.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionServiceSettings {
  pub base_url: Option<String>,
  pub app_name: String,
}

impl Default for SessionServiceSettings {
  fn default() -> Self {
    Self { base_url: None, app_name: "deckhand_agent".to_string() }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the server's own handlers.
pub struct AppState<S> {
  pub api:      ApiState<S>,
  pub hub:      Hub<S>,
  /// Flips to `true` when the server is shutting down; open sockets close.
  pub shutdown: watch::Receiver<bool>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      api:      self.api.clone(),
      hub:      self.hub.clone(),
      shutdown: self.shutdown.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ChecklistStore + 'static,
{
  let api = deckhand_api::api_router(state.api.clone());
  Router::new()
    .route("/healthz", get(healthz))
    .route("/connection/websocket", get(ws::upgrade::<S>))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str { "OK" }
