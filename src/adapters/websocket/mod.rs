//! WebSocket adapter - live session registry and connection handlers.

mod handler;
mod registry;

pub use handler::{websocket_router, WsState};
pub use registry::{ConnectionRegistry, SendError, Session, SessionId};
