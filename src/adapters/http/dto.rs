//! Request/response shapes for the poll REST API.
//!
//! Every response uses one envelope: `{ "status", "message", "data" }`,
//! with `status` either `success` or `error` and `data` null on errors.

use serde::{Deserialize, Serialize};

use crate::application::VoteOutcome;
use crate::domain::poll::{OptionId, PollId, PollOption};

/// Envelope wrapped around every API response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data,
        }
    }
}

impl ApiResponse<()> {
    /// Error envelope; `()` serializes as `null` in the `data` slot.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            data: (),
        }
    }
}

/// Body of `POST /poll`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePollRequest {
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    pub options: Vec<String>,
}

/// Body of `POST /poll/:id/vote`.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub option_id: OptionId,
}

/// Payload of a successful vote response.
#[derive(Debug, Clone, Serialize)]
pub struct VoteData {
    pub option_id: OptionId,
    pub new_vote_count: u64,
    pub option_value: String,
    pub all_options: Vec<PollOption>,
}

impl From<VoteOutcome> for VoteData {
    fn from(outcome: VoteOutcome) -> Self {
        Self {
            option_id: outcome.option_id,
            new_vote_count: outcome.new_vote_count,
            option_value: outcome.option_value,
            all_options: outcome.all_options,
        }
    }
}

/// Payload of a successful delete response.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteData {
    pub poll_id: PollId,
}

/// Payload of the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub redis: &'static str,
}
