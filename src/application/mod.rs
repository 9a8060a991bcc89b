//! Application layer - orchestrates domain operations over the ports.

mod poll_service;

pub use poll_service::{PollService, VoteOutcome};
