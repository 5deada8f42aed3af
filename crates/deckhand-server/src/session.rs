//! HTTP client for the external assistant-session service.

use std::time::Duration;

use anyhow::bail;
use deckhand_core::state::{BoxError, SessionFuture, SessionStateSource};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct SessionBody {
  #[serde(default)]
  state: Option<Value>,
}

/// Reads `GET {base_url}/apps/{app}/users/{user}/sessions/{session}` and
/// returns the `state` field. A 404 means the user has no session.
///
/// Each id is sent as exactly one percent-encoded path segment.
#[derive(Debug, Clone)]
pub struct HttpSessionState {
  client:   reqwest::Client,
  base_url: Url,
  app_name: String,
}

impl HttpSessionState {
  pub fn new(base_url: &str, app_name: &str) -> anyhow::Result<Self> {
    let base_url = Url::parse(base_url)?;
    if base_url.cannot_be_a_base() {
      bail!("session service url {base_url} cannot carry a path");
    }
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self { client, base_url, app_name: app_name.to_owned() })
  }

  /// `None` when an id could never name a single path segment.
  fn url(&self, user_id: &str, session_id: &str) -> Option<Url> {
    let ids = [self.app_name.as_str(), user_id, session_id];
    if ids.iter().any(|id| matches!(*id, "" | "." | "..")) {
      return None;
    }
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .ok()?
      .pop_if_empty()
      .extend(["apps", ids[0], "users", ids[1], "sessions", ids[2]]);
    Some(url)
  }

  async fn fetch(&self, user_id: &str, session_id: &str) -> Result<Option<Value>, BoxError> {
    let Some(url) = self.url(user_id, session_id) else {
      debug!(user_id, session_id, "unaddressable assistant session");
      return Ok(None);
    };
    let resp = self.client.get(url.clone()).send().await?;
    if resp.status() == StatusCode::NOT_FOUND {
      debug!(%url, "no assistant session");
      return Ok(None);
    }
    let body: SessionBody = resp.error_for_status()?.json().await?;
    Ok(body.state)
  }
}

impl SessionStateSource for HttpSessionState {
  fn session_state<'a>(&'a self, user_id: &'a str, session_id: &'a str) -> SessionFuture<'a> {
    Box::pin(self.fetch(user_id, session_id))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{Json, Router, extract::Path, http::StatusCode as AxumStatus, routing::get};
  use serde_json::json;
  use tokio::net::TcpListener;

  async fn session_handler(
    Path((app, user, session)): Path<(String, String, String)>,
  ) -> Result<Json<Value>, AxumStatus> {
    match (app.as_str(), user.as_str(), session.as_str()) {
      ("deckhand_agent", "user_1", "s1") => Ok(Json(json!({
        "id": "s1",
        "state": { "draft_note": "check bilge" },
      }))),
      (_, _, "broken") => Err(AxumStatus::INTERNAL_SERVER_ERROR),
      _ => Err(AxumStatus::NOT_FOUND),
    }
  }

  async fn spawn_service() -> String {
    let app = Router::new().route("/apps/{app}/users/{user}/sessions/{session}", get(session_handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
  }

  #[tokio::test]
  async fn returns_state_field() {
    let source = HttpSessionState::new(&spawn_service().await, "deckhand_agent").unwrap();
    let state = source.session_state("user_1", "s1").await.unwrap();
    assert_eq!(state, Some(json!({ "draft_note": "check bilge" })));
  }

  #[tokio::test]
  async fn missing_session_is_none() {
    let source = HttpSessionState::new(&spawn_service().await, "deckhand_agent").unwrap();
    assert_eq!(source.session_state("user_2", "s1").await.unwrap(), None);
  }

  #[tokio::test]
  async fn ids_cannot_escape_their_segment() {
    let source = HttpSessionState::new(&spawn_service().await, "deckhand_agent").unwrap();
    assert_eq!(source.session_state("x/../user_1", "s1").await.unwrap(), None);
    assert_eq!(source.session_state("..", "s1").await.unwrap(), None);
    assert_eq!(source.session_state("user_1", "s1?x=1").await.unwrap(), None);
  }

  #[test]
  fn ids_are_percent_encoded() {
    let source = HttpSessionState::new("http://sessions.local/base/", "deckhand_agent").unwrap();
    let url = source.url("a/b", "s 1").unwrap();
    assert_eq!(
      url.as_str(),
      "http://sessions.local/base/apps/deckhand_agent/users/a%2Fb/sessions/s%201"
    );
    assert!(source.url("", "s1").is_none());
  }

  #[test]
  fn rejects_base_without_path() {
    assert!(HttpSessionState::new("mailto:ops@example.com", "deckhand_agent").is_err());
  }

  #[tokio::test]
  async fn server_errors_surface() {
    let source = HttpSessionState::new(&spawn_service().await, "deckhand_agent").unwrap();
    assert!(source.session_state("user_1", "broken").await.is_err());
  }
}
