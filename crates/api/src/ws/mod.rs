//! WebSocket infrastructure for the room relay.
//!
//! Provides connection management, heartbeat pings, and the HTTP upgrade
//! handlers that run a STOMP session per connection, either over a plain
//! WebSocket or wrapped in SockJS framing.

mod handler;
mod heartbeat;
pub mod manager;
pub mod sockjs;

pub use handler::{sockjs_ws_handler, ws_handler, STOMP_SUBPROTOCOLS};
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
