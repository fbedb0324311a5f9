//! Ephemeral voice-chat room presence and signaling, built with Rust.
//!
//! Rooms and memberships live in a TTL-scoped Redis store; live connections
//! are tracked in-process by a per-room hub that fans state changes out to
//! the room's other members.

pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod idgen;
pub mod models;
pub mod repositories;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use hub::RoomHub;
pub use services::RoomService;

use axum::routing::{delete, get, post};
use handlers::http;

/// Build the API router (room lifecycle, ws, health). Used by main and by
/// integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let room_routes = axum::Router::new()
        .route("/create", post(http::create_room))
        .route("/:room_id", get(http::get_room))
        .route("/delete/:room_id", delete(http::delete_room))
        .route("/:room_id/join", post(http::join_room))
        .route("/:room_id/leave", post(http::leave_room))
        .route("/:room_id/touch", post(http::touch_room))
        .route("/:room_id/ws", get(handlers::ws_handler));

    axum::Router::new()
        .route("/api/v1/healthz", get(http::health))
        .nest("/api/v1/room", room_routes)
        .with_state(state)
}
