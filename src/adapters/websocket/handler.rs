//! WebSocket upgrade handlers for live poll connections.
//!
//! Two endpoints:
//! - `GET /ws` — global topic only (new polls, deletions)
//! - `GET /ws/:poll_id` — global topic plus the poll's topic; on open the
//!   client gets a `poll_data` snapshot and the topic gets a fresh
//!   `connection_count`, repeated on close
//!
//! Inbound frames that fail to decode are dropped without closing the
//! connection; only a transport error or close frame ends the session.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::application::PollService;
use crate::domain::poll::{ClientMessage, PollId, ServerMessage};

use super::registry::{ConnectionRegistry, Session, SessionId};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WsState {
    pub registry: Arc<ConnectionRegistry>,
    pub service: Arc<PollService>,
}

impl WsState {
    pub fn new(registry: Arc<ConnectionRegistry>, service: Arc<PollService>) -> Self {
        Self { registry, service }
    }
}

/// Creates the router for both live-connection endpoints.
pub fn websocket_router(state: WsState) -> Router {
    Router::new()
        .route("/ws", get(global_ws_handler))
        .route("/ws/:poll_id", get(poll_ws_handler))
        .with_state(state)
}

/// Handle upgrade for the unscoped endpoint.
async fn global_ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| handle_global_socket(socket, state))
}

/// Handle upgrade for a poll-scoped connection.
async fn poll_ws_handler(
    ws: WebSocketUpgrade,
    Path(poll_id): Path<String>,
    State(state): State<WsState>,
) -> Response {
    let poll_id: PollId = match poll_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return Response::builder()
                .status(400)
                .body("Invalid poll ID".into())
                .unwrap();
        }
    };

    ws.on_upgrade(move |socket| handle_poll_socket(socket, poll_id, state))
}

async fn handle_global_socket(socket: WebSocket, state: WsState) {
    let (session, outbound) = Session::channel();
    let session_id = session.id();
    state.registry.register(session, None).await;

    run_session(socket, session_id, outbound, state.registry.clone()).await;

    state.registry.unregister(session_id, None).await;
}

async fn handle_poll_socket(socket: WebSocket, poll_id: PollId, state: WsState) {
    let (session, outbound) = Session::channel();
    let session_id = session.id();
    state.registry.register(session, Some(poll_id)).await;

    // Current snapshot first, if the poll exists.
    if let Ok(poll) = state.service.get_poll(poll_id).await {
        if let Err(e) = state
            .registry
            .send_to(session_id, &ServerMessage::poll_data(&poll))
            .await
        {
            tracing::debug!(%session_id, "failed to send poll snapshot: {e}");
        }
    }
    broadcast_connection_count(&state.registry, poll_id).await;

    run_session(socket, session_id, outbound, state.registry.clone()).await;

    state.registry.unregister(session_id, None).await;
    broadcast_connection_count(&state.registry, poll_id).await;
}

/// Tells the poll topic how many subscribers it now has.
async fn broadcast_connection_count(registry: &ConnectionRegistry, poll_id: PollId) {
    let count = registry.topic_size(poll_id).await;
    registry
        .broadcast(
            poll_id,
            &ServerMessage::ConnectionCount { poll_id, count },
        )
        .await;
}

/// Pumps a session until its transport closes.
///
/// One task drains the registry's outbound channel into the socket; another
/// decodes inbound frames. Whichever stops first aborts the other.
async fn run_session(
    socket: WebSocket,
    session_id: SessionId,
    mut outbound: mpsc::UnboundedReceiver<String>,
    registry: Arc<ConnectionRegistry>,
) {
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    // Unknown types and malformed frames are ignored.
                    if let Ok(ClientMessage::Ping) = serde_json::from_str::<ClientMessage>(&text) {
                        let _ = registry.send_to(session_id, &ServerMessage::Pong).await;
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(%session_id, "client sent close frame");
                    break;
                }
                Ok(_) => {
                    // Binary and protocol-level ping/pong frames need no
                    // handling here.
                }
                Err(e) => {
                    tracing::debug!(%session_id, "receive error: {e}");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}
