//! Pollcast - real-time polling backend.
//!
//! Clients create polls and cast votes over REST; live WebSocket sessions
//! receive vote updates, connection counts, and poll lifecycle events,
//! fanned out per poll topic. Polls persist in Redis.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
