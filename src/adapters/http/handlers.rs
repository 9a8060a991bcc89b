//! HTTP handlers for the poll REST API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::PollService;
use crate::domain::poll::{PollError, PollId};
use crate::ports::KeyValueStore;

use super::dto::{
    ApiResponse, CreatePollRequest, DeleteData, HealthData, VoteData, VoteRequest,
};

/// Shared state for the REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PollService>,
    pub store: Arc<dyn KeyValueStore>,
}

impl AppState {
    pub fn new(service: Arc<PollService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { service, store }
    }
}

/// POST /poll - Create a new poll
pub async fn create_poll(
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> Response {
    match state
        .service
        .create_poll(req.question, req.description, req.options)
        .await
    {
        Ok(poll) => (
            StatusCode::CREATED,
            Json(ApiResponse::success("Poll created successfully", poll)),
        )
            .into_response(),
        Err(e) => poll_error_response(e),
    }
}

/// GET /poll/:id - Get a specific poll
pub async fn get_poll(State(state): State<AppState>, Path(poll_id): Path<String>) -> Response {
    let Some(poll_id) = parse_poll_id(&poll_id) else {
        return invalid_poll_id();
    };

    match state.service.get_poll(poll_id).await {
        Ok(poll) => (
            StatusCode::OK,
            Json(ApiResponse::success("Poll retrieved successfully", poll)),
        )
            .into_response(),
        Err(e) => poll_error_response(e),
    }
}

/// POST /poll/:id/vote - Vote on a poll
pub async fn vote(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Response {
    let Some(poll_id) = parse_poll_id(&poll_id) else {
        return invalid_poll_id();
    };

    match state.service.vote(poll_id, req.option_id).await {
        Ok(outcome) => {
            let message = format!("Vote recorded for '{}'", outcome.option_value);
            (
                StatusCode::OK,
                Json(ApiResponse::success(message, VoteData::from(outcome))),
            )
                .into_response()
        }
        Err(e) => poll_error_response(e),
    }
}

/// GET /poll - List all polls
pub async fn list_polls(State(state): State<AppState>) -> Response {
    match state.service.list_polls().await {
        Ok(polls) => {
            let message = format!("Retrieved {} polls successfully", polls.len());
            (StatusCode::OK, Json(ApiResponse::success(message, polls))).into_response()
        }
        Err(e) => poll_error_response(e),
    }
}

/// DELETE /poll/:id - Delete a poll
pub async fn delete_poll(State(state): State<AppState>, Path(poll_id): Path<String>) -> Response {
    let Some(poll_id) = parse_poll_id(&poll_id) else {
        return invalid_poll_id();
    };

    match state.service.delete_poll(poll_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                format!("Poll {poll_id} deleted successfully"),
                DeleteData { poll_id },
            )),
        )
            .into_response(),
        Err(e) => poll_error_response(e),
    }
}

/// GET /health - Store connectivity status
pub async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                "Service is healthy",
                HealthData { redis: "connected" },
            )),
        )
            .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                status: super::dto::ResponseStatus::Error,
                message: "Service is unhealthy - Redis connection failed".to_string(),
                data: HealthData { redis: "disconnected" },
            }),
        )
            .into_response(),
    }
}

fn parse_poll_id(raw: &str) -> Option<PollId> {
    raw.parse().ok()
}

fn invalid_poll_id() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error("Invalid poll ID")),
    )
        .into_response()
}

/// Maps the error taxonomy onto user-facing statuses.
fn poll_error_response(error: PollError) -> Response {
    let (status, message) = match &error {
        PollError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        PollError::InvalidOption(_) => (StatusCode::BAD_REQUEST, "Invalid option ID".to_string()),
        PollError::NotFound(_) => (StatusCode::NOT_FOUND, "Poll not found".to_string()),
        PollError::Store(e) => {
            tracing::error!(%e, "store failure on request path");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable".to_string(),
            )
        }
    };

    (status, Json(ApiResponse::error(message))).into_response()
}
