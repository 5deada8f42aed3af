//! deckhand server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `DECKHAND_*` environment variables, opens the SQLite store, starts the
//! change listener and serves the REST API and WebSocket transport until
//! interrupted.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use deckhand_api::ApiState;
use deckhand_core::state::{NoSessionState, SessionStateSource};
use deckhand_realtime::{Hub, Listener};
use deckhand_server::{AppState, ServerConfig, session::HttpSessionState};
use deckhand_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Deckhand checklist sync server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("DECKHAND")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store = if server_cfg.is_in_memory() {
    SqliteStore::open_in_memory()
      .await
      .context("failed to open in-memory store")?
  } else {
    let store_path = expand_tilde(&server_cfg.store_path);
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?
  };
  let store = Arc::new(store);

  // Realtime: hub plus the listener feeding it.
  let hub = Hub::new(Arc::clone(&store), server_cfg.hub.hub_config());
  let feed = store.change_feed(server_cfg.listener.poll_interval());
  let listener = Listener::new(feed, Arc::new(hub.clone()), server_cfg.listener.listener_config()).spawn();

  let sessions: Arc<dyn SessionStateSource> = match &server_cfg.session_service.base_url {
    Some(url) => Arc::new(
      HttpSessionState::new(url, &server_cfg.session_service.app_name)
        .context("failed to build session service client")?,
    ),
    None => Arc::new(NoSessionState),
  };

  // Build application state.
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let state = AppState {
    api:      ApiState::new(Arc::clone(&store), sessions),
    hub:      hub.clone(),
    shutdown: shutdown_rx,
  };

  let app = deckhand_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let tcp = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  let served = axum::serve(tcp, app)
    .with_graceful_shutdown(async move {
      shutdown_signal().await;
      tracing::info!("shutting down");
      let _ = shutdown_tx.send(true);
    })
    .await
    .context("server error");

  listener.stop().await;
  hub.shutdown();
  served
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
