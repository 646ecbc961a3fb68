//! roomcast API Library
//!
//! Real-time room fan-out relay: authenticated WebSocket clients join rooms,
//! and events from peers or the HTTP control plane are broadcast to each room.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use bridge::{BridgeError, ControlBridge, TriggerKind};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
