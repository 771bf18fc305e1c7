//! Long-polling sessions for clients that cannot upgrade to a WebSocket.
//!
//! A session wraps one relay peer. `GET` drains the peer's queue, holding the
//! request open for up to the poll window when the queue is empty. Sessions
//! that stop polling are reaped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lunchparty_shared::{Frame, ServerEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::relay::PeerId;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct PollOpened {
    pub sid: String,
}

#[derive(Debug)]
pub struct PollSession {
    peer: PeerId,
    queue: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    last_seen: Mutex<Instant>,
}

impl PollSession {
    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

#[derive(Debug, Default)]
pub struct PollSessions {
    sessions: RwLock<HashMap<String, Arc<PollSession>>>,
}

impl PollSessions {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, peer: PeerId, queue: mpsc::UnboundedReceiver<Frame>) -> String {
        let sid = Uuid::new_v4().simple().to_string();
        let session = PollSession {
            peer,
            queue: tokio::sync::Mutex::new(queue),
            last_seen: Mutex::new(Instant::now()),
        };
        self.sessions
            .write()
            .await
            .insert(sid.clone(), Arc::new(session));
        sid
    }

    async fn get(&self, sid: &str) -> Option<Arc<PollSession>> {
        self.sessions.read().await.get(sid).cloned()
    }

    async fn remove(&self, sid: &str) -> Option<Arc<PollSession>> {
        self.sessions.write().await.remove(sid)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions idle for longer than `idle`, returning their peers.
    async fn take_idle(&self, idle: Duration) -> Vec<PeerId> {
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();
        sessions.retain(|sid, session| {
            let keep = session.idle_for() < idle;
            if !keep {
                tracing::debug!("Reaping idle polling session {}", sid);
                expired.push(session.peer);
            }
            keep
        });
        expired
    }
}

/// `POST /poll`: open a session.
pub async fn open(State(state): State<AppState>) -> Json<PollOpened> {
    let (peer, queue) = state.relay.connect().await;
    let sid = state.polls.insert(peer, queue).await;
    tracing::info!("Polling peer {} connected (session {})", peer, sid);
    Json(PollOpened { sid })
}

/// `GET /poll/{sid}`: wait for queued frames.
pub async fn poll(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<Vec<Frame>>, StatusCode> {
    let session = state.polls.get(&sid).await.ok_or(StatusCode::NOT_FOUND)?;
    session.touch();

    let mut queue = session.queue.lock().await;
    let first = match tokio::time::timeout(state.config.poll_window, queue.recv()).await {
        Ok(Some(frame)) => frame,
        // Peer was dropped from the relay while we waited.
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Ok(Json(Vec::new())),
    };

    let mut frames = vec![first];
    while let Ok(frame) = queue.try_recv() {
        frames.push(frame);
    }
    session.touch();
    Ok(Json(frames))
}

/// `POST /poll/{sid}`: a JSON array of client frames.
pub async fn push(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    body: String,
) -> StatusCode {
    let Some(session) = state.polls.get(&sid).await else {
        return StatusCode::NOT_FOUND;
    };
    session.touch();

    match Frame::decode_batch(&body) {
        Ok(frames) => {
            for frame in &frames {
                state.relay.handle_frame(session.peer, frame).await;
            }
        }
        Err(e) => {
            let event = ServerEvent::error(e.code(), e.to_string());
            state.relay.send_to(session.peer, &event).await;
        }
    }
    StatusCode::NO_CONTENT
}

/// `DELETE /poll/{sid}`: close a session.
pub async fn close(State(state): State<AppState>, Path(sid): Path<String>) -> StatusCode {
    match state.polls.remove(&sid).await {
        Some(session) => {
            state.relay.disconnect(session.peer).await;
            tracing::info!("Polling peer {} closed (session {})", session.peer, sid);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Periodically drop sessions whose client stopped polling.
pub fn spawn_reaper(state: AppState) -> JoinHandle<()> {
    let idle = state.config.session_idle_timeout();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.poll_window.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            for peer in state.polls.take_idle(idle).await {
                state.relay.disconnect(peer).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_sessions_are_taken_once() {
        let sessions = PollSessions::new();
        let (_tx, rx) = mpsc::unbounded_channel();
        let peer = Uuid::new_v4();
        let sid = sessions.insert(peer, rx).await;

        assert!(sessions.take_idle(Duration::from_secs(60)).await.is_empty());
        assert_eq!(sessions.take_idle(Duration::ZERO).await, vec![peer]);
        assert!(sessions.get(&sid).await.is_none());
        assert_eq!(sessions.len().await, 0);
    }
}
