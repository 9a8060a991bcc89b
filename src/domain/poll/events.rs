//! Live-connection message protocol.
//!
//! A closed set of typed envelopes exchanged over a WebSocket, each carrying
//! a `type` discriminator:
//! - Client → Server: pings
//! - Server → Client: pongs, poll snapshots, vote updates, connection
//!   counts, poll created/deleted notifications
//!
//! Frames that fail to decode (unknown `type`, malformed JSON) are dropped
//! by the connection handler without closing the connection.

use serde::{Deserialize, Serialize};

use super::model::{OptionId, Poll, PollId, PollOption};

/// All message types that can be received from a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat request.
    Ping,
}

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Heartbeat response.
    Pong,

    /// Full poll snapshot, sent once when a poll-scoped connection opens.
    PollData {
        poll_id: PollId,
        question: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        options: Vec<PollOption>,
    },

    /// Current subscriber count of a poll topic, sent on subscribe and
    /// unsubscribe.
    ConnectionCount { poll_id: PollId, count: usize },

    /// A poll was created; sent to every connection.
    NewPoll { poll: Poll },

    /// A vote was cast; sent to the poll's topic.
    VoteUpdate {
        poll_id: PollId,
        option_id: OptionId,
        new_vote_count: u64,
        option_value: String,
        all_options: Vec<PollOption>,
    },

    /// A poll was deleted; sent to every connection.
    PollDeleted { poll_id: PollId },
}

impl ServerMessage {
    /// Builds the snapshot message for a poll.
    pub fn poll_data(poll: &Poll) -> Self {
        ServerMessage::PollData {
            poll_id: poll.id,
            question: poll.question.clone(),
            description: poll.description.clone(),
            options: poll.options.clone(),
        }
    }
}
