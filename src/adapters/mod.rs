//! Adapters - implementations of the port interfaces and the transport
//! surfaces (HTTP, WebSocket).

pub mod http;
pub mod memory;
pub mod redis;
pub mod websocket;
