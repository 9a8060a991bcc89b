//! HTTP adapter - the poll REST API.

mod dto;
mod handlers;
mod routes;

pub use dto::{ApiResponse, CreatePollRequest, ResponseStatus, VoteRequest};
pub use handlers::AppState;
pub use routes::poll_routes;
