use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// STOMP-over-WebSocket endpoints, mounted at the root.
///
/// ```text
/// /ws                                  plain WebSocket
/// /ws/websocket                        plain WebSocket (SockJS-era alias)
/// /ws/info                             SockJS transport info
/// /ws/{server}/{session}/websocket     SockJS WebSocket transport
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/ws/websocket", get(ws::ws_handler))
        .route("/ws/info", get(ws::sockjs::info))
        .route(
            "/ws/{server}/{session}/websocket",
            get(ws::sockjs_ws_handler),
        )
}
