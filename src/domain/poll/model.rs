//! Poll aggregate and its value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::PollError;

/// Unique identifier for a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(Uuid);

impl PollId {
    /// Creates a new random PollId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PollId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PollId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PollId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for an option within a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(Uuid);

impl OptionId {
    /// Creates a new random OptionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an OptionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OptionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One votable option of a poll.
///
/// Owned exclusively by its poll. `value` is immutable after creation;
/// only `vote` changes, and it never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub value: String,
    pub vote: u64,
}

impl PollOption {
    /// Creates a fresh option with a zero vote count.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: OptionId::new(),
            value: value.into(),
            vote: 0,
        }
    }
}

/// A poll: a question with an ordered, fixed set of options.
///
/// The option sequence is fixed at creation; only vote counters mutate
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Vec<PollOption>,
}

impl Poll {
    /// Creates a new poll with fresh option ids and zeroed counters.
    ///
    /// Fails with [`PollError::Validation`] if the question is empty or no
    /// options are given.
    pub fn new(
        question: impl Into<String>,
        description: Option<String>,
        option_values: Vec<String>,
    ) -> Result<Self, PollError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(PollError::validation("question cannot be empty"));
        }
        if option_values.is_empty() {
            return Err(PollError::validation("poll must have at least one option"));
        }

        Ok(Self {
            id: PollId::new(),
            question,
            description,
            options: option_values.into_iter().map(PollOption::new).collect(),
        })
    }

    /// Looks up an option by id.
    pub fn option(&self, option_id: OptionId) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}
