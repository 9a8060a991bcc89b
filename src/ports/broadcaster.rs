//! Broadcaster port - the seam between the poll engine and live sessions.
//!
//! The poll engine knows topics, not transport sessions; the connection
//! registry knows sessions, not poll semantics. They compose only through
//! this interface. Delivery is best-effort: implementations must never
//! surface per-session failures to the caller.

use async_trait::async_trait;

use crate::domain::poll::{PollId, ServerMessage};

/// Port for fanning out messages to live sessions by topic.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Delivers a message to every current subscriber of a poll topic.
    async fn broadcast_poll(&self, poll_id: PollId, message: &ServerMessage);

    /// Delivers a message to every live session.
    async fn broadcast_all(&self, message: &ServerMessage);
}
