//! HTTP routes for the poll REST API.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_poll, delete_poll, get_poll, health, list_polls, vote, AppState,
};

/// Creates the REST router; mount it under `/api/v1`.
pub fn poll_routes(state: AppState) -> Router {
    Router::new()
        .route("/poll", post(create_poll).get(list_polls))
        .route("/poll/:id", get(get_poll).delete(delete_poll))
        .route("/poll/:id/vote", post(vote))
        .route("/health", get(health))
        .with_state(state)
}
