//! Connection registry for live WebSocket sessions.
//!
//! Tracks every live session plus per-poll topic membership and fans
//! messages out to one or many sessions:
//!
//! ```text
//! global set          topic: poll-123     topic: poll-456
//! ├── session-a       ├── session-a       └── session-d
//! ├── session-b       └── session-b
//! ├── session-c
//! └── session-d
//! ```
//!
//! Each session owns an unbounded channel; the registry holds the sending
//! half and the session's socket task drains the receiving half. A dropped
//! receiver is the send-failure signal, and a failed member is unregistered
//! only after the full broadcast pass, so one dead session never blocks
//! delivery to the rest.
//!
//! The registry knows nothing about poll semantics; it only routes frames.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::domain::poll::{PollId, ServerMessage};
use crate::ports::Broadcaster;

/// Unique identifier for a live session, generated server-side on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure to deliver a directed message to one session.
///
/// Local to that session: it triggers the session's removal and is reported
/// to the immediate caller, never to a broadcast.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("session {0} is not registered")]
    NotRegistered(SessionId),

    #[error("session {0} channel closed")]
    ChannelClosed(SessionId),
}

/// A live session: its identity plus the sending half of its outbound
/// channel. The socket task owns the receiving half.
pub struct Session {
    id: SessionId,
    sender: mpsc::UnboundedSender<String>,
}

impl Session {
    /// Creates a session and the receiver its socket task will drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: SessionId::new(),
                sender,
            },
            receiver,
        )
    }

    pub fn id(&self) -> SessionId {
        self.id
    }
}

#[derive(Default)]
struct RegistryState {
    /// Every live session; doubles as the global broadcast topic.
    sessions: HashMap<SessionId, mpsc::UnboundedSender<String>>,

    /// Lazily created per-poll topics, removed when the last member leaves.
    topics: HashMap<PollId, HashSet<SessionId>>,
}

/// Registry of live sessions and their topic memberships.
///
/// Constructed once at server start and shared via `Arc`; all state lives
/// behind an `RwLock` so concurrent connects, disconnects, and broadcasts
/// never corrupt each other.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to the global set and, if given, to a poll topic
    /// (created on first subscriber). Idempotent per session/topic pair.
    pub async fn register(&self, session: Session, poll: Option<PollId>) {
        let mut state = self.state.write().await;
        state.sessions.insert(session.id, session.sender);
        if let Some(poll_id) = poll {
            state.topics.entry(poll_id).or_default().insert(session.id);
        }

        tracing::info!(
            session_id = %session.id,
            poll_id = ?poll.map(|p| p.to_string()),
            total = state.sessions.len(),
            "session connected"
        );
    }

    /// Removes a session. With a poll given, only that topic membership is
    /// dropped; otherwise the session leaves the global set and every
    /// topic. A topic whose last member leaves is deleted. Calling this
    /// again for the same session is a no-op.
    pub async fn unregister(&self, session_id: SessionId, poll: Option<PollId>) {
        let mut state = self.state.write().await;
        match poll {
            Some(poll_id) => {
                if let Some(members) = state.topics.get_mut(&poll_id) {
                    members.remove(&session_id);
                    if members.is_empty() {
                        state.topics.remove(&poll_id);
                    }
                }
            }
            None => {
                if state.sessions.remove(&session_id).is_none() {
                    return;
                }
                state.topics.retain(|_, members| {
                    members.remove(&session_id);
                    !members.is_empty()
                });

                tracing::info!(
                    session_id = %session_id,
                    total = state.sessions.len(),
                    "session disconnected"
                );
            }
        }
    }

    /// Delivers a message to one session. A failure unregisters the
    /// session as a side effect and is returned to the caller.
    pub async fn send_to(
        &self,
        session_id: SessionId,
        message: &ServerMessage,
    ) -> Result<(), SendError> {
        let sender = {
            let state = self.state.read().await;
            state
                .sessions
                .get(&session_id)
                .cloned()
                .ok_or(SendError::NotRegistered(session_id))?
        };

        if sender.send(serialize(message)).is_err() {
            self.unregister(session_id, None).await;
            return Err(SendError::ChannelClosed(session_id));
        }
        Ok(())
    }

    /// Delivers a message to every current member of a poll topic.
    ///
    /// Membership is snapshotted before iterating, so concurrent
    /// registration changes cannot corrupt the pass. Members whose delivery
    /// fails are unregistered after the full pass; their failures never
    /// reach the caller.
    pub async fn broadcast(&self, poll_id: PollId, message: &ServerMessage) {
        let members: Vec<(SessionId, mpsc::UnboundedSender<String>)> = {
            let state = self.state.read().await;
            match state.topics.get(&poll_id) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| state.sessions.get(id).map(|tx| (*id, tx.clone())))
                    .collect(),
                None => return,
            }
        };

        self.deliver(members, message).await;
    }

    /// Delivers a message to every live session.
    pub async fn broadcast_all(&self, message: &ServerMessage) {
        let members: Vec<(SessionId, mpsc::UnboundedSender<String>)> = {
            let state = self.state.read().await;
            state
                .sessions
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        self.deliver(members, message).await;
    }

    /// Current subscriber count of a poll topic. May be stale by the time
    /// the caller acts on it.
    pub async fn topic_size(&self, poll_id: PollId) -> usize {
        self.state
            .read()
            .await
            .topics
            .get(&poll_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Current count of live sessions.
    pub async fn total_size(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Ids of every topic with at least one subscriber (for monitoring).
    pub async fn active_topics(&self) -> Vec<PollId> {
        self.state.read().await.topics.keys().copied().collect()
    }

    async fn deliver(
        &self,
        members: Vec<(SessionId, mpsc::UnboundedSender<String>)>,
        message: &ServerMessage,
    ) {
        if members.is_empty() {
            return;
        }

        let frame = serialize(message);
        let mut failed = Vec::new();
        for (session_id, sender) in members {
            if sender.send(frame.clone()).is_err() {
                tracing::debug!(%session_id, "delivery failed during broadcast");
                failed.push(session_id);
            }
        }

        for session_id in failed {
            self.unregister(session_id, None).await;
        }
    }
}

fn serialize(message: &ServerMessage) -> String {
    serde_json::to_string(message).expect("ServerMessage serialization should not fail")
}

#[async_trait::async_trait]
impl Broadcaster for ConnectionRegistry {
    async fn broadcast_poll(&self, poll_id: PollId, message: &ServerMessage) {
        self.broadcast(poll_id, message).await;
    }

    async fn broadcast_all(&self, message: &ServerMessage) {
        ConnectionRegistry::broadcast_all(self, message).await;
    }
}
