//! WebSocket support for room fan-out
//!
//! Provides the real-time relay:
//! - Authenticated connections with at most one live connection per user
//! - Single-room membership per connection with join/leave notices
//! - Room broadcasts from clients' peers or the control plane
//!
//! # Architecture
//!
//! - **Connection**: Handle to an authenticated WebSocket's writer
//! - **Registry**: Connections, user slots and room member sets behind one lock
//! - **Room**: Join/leave/disconnect state machine and membership notices
//! - **Broadcast**: Fan-out of arbitrary events and relay statistics
//! - **State**: Shared relay state handed to every connection
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Wire event definitions for client/server communication

pub mod broadcast;
pub mod connection;
pub mod events;
pub mod handler;
pub mod registry;
pub mod room;
pub mod state;

pub use broadcast::{BroadcastRouter, FanOutReport, RelayStats};
pub use handler::ws_handler;
pub use room::RoomSessionManager;
pub use state::RelayState;
