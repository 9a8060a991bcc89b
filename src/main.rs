//! Pollcast server entry point.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pollcast::adapters::http::{poll_routes, AppState};
use pollcast::adapters::redis::RedisStore;
use pollcast::adapters::websocket::{websocket_router, ConnectionRegistry, WsState};
use pollcast::application::PollService;
use pollcast::config::{AppConfig, ServerConfig};
use pollcast::ports::KeyValueStore;

#[tokio::main]
async fn main() {
    let config = AppConfig::load().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let client =
        redis::Client::open(config.redis.url.as_str()).expect("Invalid Redis URL");
    let conn = tokio::time::timeout(
        config.redis.timeout(),
        client.get_multiplexed_tokio_connection(),
    )
    .await
    .expect("Timed out connecting to Redis")
    .expect("Failed to connect to Redis");

    let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::new(conn));
    match store.ping().await {
        Ok(()) => tracing::info!("connected to Redis"),
        Err(e) => tracing::warn!(%e, "Redis ping failed at startup"),
    }

    let registry = Arc::new(ConnectionRegistry::new());
    let service = Arc::new(PollService::new(store.clone(), registry.clone()));

    let app = Router::new()
        .nest("/api/v1", poll_routes(AppState::new(service.clone(), store)))
        .merge(websocket_router(WsState::new(registry, service)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server));

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    tracing::info!(%addr, "pollcast listening");

    axum::serve(listener, app).await.expect("Server error");
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if config.allow_permissive_cors() {
        CorsLayer::permissive()
    } else {
        tracing::warn!("no CORS origins configured in production; cross-origin requests are blocked");
        CorsLayer::new()
    }
}
