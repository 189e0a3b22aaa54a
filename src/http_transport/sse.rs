//! SSE session routing
//!
//! A client opens `GET /sse`, receives an `endpoint` event naming
//! `/message?session_id=<id>`, and POSTs requests there. Responses for that
//! session are pushed back over the stream as `message` events.

use crate::error::{HistoryError, Result};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

const SESSION_CHANNEL_CAPACITY: usize = 100;

/// Routes JSON-RPC responses to open SSE streams
#[derive(Clone, Default)]
pub struct SseSessionManager {
    sessions: Arc<RwLock<HashMap<String, broadcast::Sender<Value>>>>,
}

impl SseSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and get both ends of its channel
    pub async fn register_session(
        &self,
        session_id: &str,
    ) -> (broadcast::Sender<Value>, broadcast::Receiver<Value>) {
        let (sender, receiver) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), sender.clone());
        (sender, receiver)
    }

    /// Push a response to one session's stream
    pub async fn send_session_response(&self, session_id: &str, response: Value) -> Result<()> {
        let sessions = self.sessions.read().await;
        let sender = sessions
            .get(session_id)
            .ok_or_else(|| HistoryError::not_found(format!("SSE session {session_id}")))?;
        sender.send(response).map(|_| ()).map_err(|e| {
            warn!(session_id, error = %e, "Failed to deliver SSE response");
            HistoryError::connection(format!("Session response failed: {e}"))
        })
    }

    pub async fn has_session(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Remove session when the stream closes
    pub async fn remove_session(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            debug!(session_id, "SSE session removed");
        }
    }

    /// Remove the session only while it still routes to `sender`
    pub async fn remove_session_if_current(
        &self,
        session_id: &str,
        sender: &broadcast::Sender<Value>,
    ) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|current| current.same_channel(sender))
        {
            sessions.remove(session_id);
            debug!(session_id, "SSE session removed");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Deregisters the session when the stream is dropped
struct SessionGuard {
    session_id: String,
    sender: broadcast::Sender<Value>,
    manager: SseSessionManager,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let manager = self.manager.clone();
        let sender = self.sender.clone();
        let session_id = std::mem::take(&mut self.session_id);
        info!(session_id = %session_id, "SSE connection closed");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                manager
                    .remove_session_if_current(&session_id, &sender)
                    .await
            });
        }
    }
}

/// Build the event stream for a new session
pub async fn session_stream(
    manager: SseSessionManager,
    session_id: String,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    info!(session_id = %session_id, "SSE connection established");

    let (sender, receiver) = manager.register_session(&session_id).await;
    let endpoint_event = Event::default()
        .event("endpoint")
        .data(format!("/message?session_id={session_id}"));

    let guard = SessionGuard {
        session_id,
        sender,
        manager,
    };

    let responses = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        loop {
            match receiver.recv().await {
                Ok(response) => {
                    let event = Event::default().event("message").data(response.to_string());
                    return Some((event, (receiver, guard)));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(session_id = %guard.session_id, skipped, "SSE session lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let events = stream::once(async move { endpoint_event })
        .chain(responses)
        .map(Ok::<Event, Infallible>);

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_session_routing() {
        let manager = SseSessionManager::new();
        let (_, mut receiver) = manager.register_session("abc").await;
        assert!(manager.has_session("abc").await);

        manager
            .send_session_response("abc", json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(receiver.recv().await.unwrap(), json!({"id": 1}));

        manager.remove_session("abc").await;
        assert_eq!(manager.session_count().await, 0);
        assert!(manager
            .send_session_response("abc", json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_closing_stale_stream_keeps_newer_session() {
        let manager = SseSessionManager::new();
        let first = session_stream(manager.clone(), "shared".to_string()).await;
        let second = session_stream(manager.clone(), "shared".to_string()).await;

        drop(first);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.has_session("shared").await);

        drop(second);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!manager.has_session("shared").await);
    }
}
