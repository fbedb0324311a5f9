//! Entry point: load config, wire dependencies, and run the server.

use axum::http::{HeaderValue, Method};
use roomcast::config::Config;
use roomcast::idgen::RoomIdGenerator;
use roomcast::repositories::RedisRoomRepo;
use roomcast::{create_app, AppState, RoomHub, RoomService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let repo = Arc::new(RedisRoomRepo::new(&config.redis_url)?);
    let room_service = RoomService::new(repo, Arc::new(RoomIdGenerator), config.room_ttl_sec);
    let hub = Arc::new(RoomHub::new());

    let state = AppState { room_service, hub };

    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false);

    let app = create_app(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(addr = %config.server_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
