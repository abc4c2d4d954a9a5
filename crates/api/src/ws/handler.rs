use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use wecode_relay::{Frame, SessionFlow, StompSession, Version};

use crate::state::AppState;
use crate::ws::sockjs;

/// WebSocket subprotocols offered to STOMP clients, most preferred first.
pub const STOMP_SUBPROTOCOLS: [&str; 3] = ["v12.stomp", "v11.stomp", "v10.stomp"];

/// How long queued frames (a final ERROR or RECEIPT) get to drain after the
/// session ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How STOMP frames are carried in WebSocket messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    /// One frame per message, as is.
    Raw,
    /// Frames wrapped in SockJS `a[...]` arrays.
    SockJs,
}

/// GET /ws, /ws/websocket -- upgrade to a plain STOMP WebSocket.
pub async fn ws_handler(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    upgrade(&headers, ws, state, Transport::Raw)
}

/// GET /ws/{server}/{session}/websocket -- SockJS WebSocket transport.
pub async fn sockjs_ws_handler(
    Path((server, session)): Path<(String, String)>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    tracing::debug!(server = %server, session = %session, "SockJS WebSocket requested");
    upgrade(&headers, ws, state, Transport::SockJs)
}

/// Browser handshakes carrying an `Origin` outside the allowed list are
/// refused with 403. Requests without an `Origin` header come from
/// non-browser clients and are accepted.
fn upgrade(
    headers: &HeaderMap,
    ws: WebSocketUpgrade,
    state: AppState,
    transport: Transport,
) -> Response {
    if let Some(origin) = headers.get(ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| state.config.is_allowed_origin(o))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(origin = ?origin, "Rejected WebSocket handshake from disallowed origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    ws.protocols(STOMP_SUBPROTOCOLS)
        .on_upgrade(move |socket| handle_socket(socket, state, transport))
        .into_response()
}

/// Drive a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that writes STOMP frames and control messages.
///   3. Feeds inbound messages to the connection's `StompSession`.
///   4. Cleans up subscriptions and registration on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, transport: Transport) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, ?transport, "WebSocket connected");

    let mut control = state.ws_manager.add(conn_id.clone()).await;
    let (frame_tx, mut frames) = mpsc::unbounded_channel::<Frame>();
    let mut session = StompSession::new(
        conn_id.clone(),
        frame_tx,
        state.broker.clone(),
        state.relay.clone(),
    );
    let version = session.watch_version();

    let (mut sink, mut stream) = socket.split();

    // Sender task: runs until every frame sender is gone or a Close goes out.
    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        if transport == Transport::SockJs
            && sink.send(Message::Text(sockjs::OPEN_FRAME.into())).await.is_err()
        {
            return;
        }
        let mut control_open = true;
        loop {
            let msg = tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => to_message(&frame, current_version(&version), transport),
                    None => break,
                },
                msg = control.recv(), if control_open => match msg {
                    Some(msg) => msg,
                    None => {
                        control_open = false;
                        continue;
                    }
                },
            };
            let closing = matches!(msg, Message::Close(_));
            if closing && transport == Transport::SockJs {
                let _ = sink.send(Message::Text(sockjs::close_frame().into())).await;
            }
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                return;
            }
            if closing {
                return;
            }
        }
        if transport == Transport::SockJs {
            let _ = sink.send(Message::Text(sockjs::close_frame().into())).await;
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // Receiver loop: hand inbound bytes to the session.
    while let Some(result) = stream.next().await {
        let flow = match result {
            Ok(Message::Text(text)) => match transport {
                Transport::Raw => session.handle_bytes(text.as_str().as_bytes()).await,
                Transport::SockJs => handle_sockjs_text(&mut session, text.as_str()).await,
            },
            Ok(Message::Binary(data)) => match transport {
                Transport::Raw => session.handle_bytes(&data).await,
                Transport::SockJs => {
                    tracing::debug!(conn_id = %conn_id, "Binary message on SockJS transport");
                    SessionFlow::Close
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
                SessionFlow::Continue
            }
            Ok(Message::Ping(_)) => SessionFlow::Continue,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        };
        if flow == SessionFlow::Close {
            break;
        }
    }

    // Clean up: drop subscriptions so the frame channel closes, let the
    // sender drain, then forget the connection.
    session.close().await;
    drop(session);
    state.ws_manager.remove(&conn_id).await;
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

async fn handle_sockjs_text(session: &mut StompSession, text: &str) -> SessionFlow {
    let messages = match sockjs::decode_messages(text) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::debug!(conn_id = %session.conn_id(), error = %e, "Malformed SockJS frame");
            return SessionFlow::Close;
        }
    };
    for message in messages {
        if session.handle_bytes(message.as_bytes()).await == SessionFlow::Close {
            return SessionFlow::Close;
        }
    }
    SessionFlow::Continue
}

/// Frames before CONNECT (only ever an ERROR) use 1.2 encoding.
fn current_version(version: &watch::Receiver<Option<Version>>) -> Version {
    version.borrow().unwrap_or(Version::V1_2)
}

/// Plain STOMP frames go out as text when they are valid UTF-8, binary
/// otherwise. SockJS only carries text.
fn to_message(frame: &Frame, version: Version, transport: Transport) -> Message {
    let wire = frame.encode_for(version);
    match transport {
        Transport::Raw => match String::from_utf8(wire) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        },
        Transport::SockJs => {
            Message::Text(sockjs::message_frame(&String::from_utf8_lossy(&wire)).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use wecode_relay::Command;

    use super::*;

    #[test]
    fn utf8_frames_become_text_messages() {
        let frame = Frame::new(Command::Receipt).header("receipt-id", "1");
        assert_matches!(
            to_message(&frame, Version::V1_2, Transport::Raw),
            Message::Text(t) if t.as_str() == "RECEIPT\nreceipt-id:1\n\n\0"
        );
    }

    #[test]
    fn binary_bodies_become_binary_messages() {
        let frame = Frame::new(Command::Message).with_body(vec![0xFFu8, 0x00]);
        assert_matches!(
            to_message(&frame, Version::V1_2, Transport::Raw),
            Message::Binary(_)
        );
    }

    #[test]
    fn headers_follow_negotiated_version() {
        let frame = Frame::new(Command::Message).header("destination", "/topic/room/sync/a:b");
        assert_matches!(
            to_message(&frame, Version::V1_0, Transport::Raw),
            Message::Text(t) if t.as_str().contains("/topic/room/sync/a:b\n")
        );
        assert_matches!(
            to_message(&frame, Version::V1_1, Transport::Raw),
            Message::Text(t) if t.as_str().contains("/topic/room/sync/a\\cb\n")
        );
    }

    #[test]
    fn sockjs_frames_are_wrapped_in_arrays() {
        let frame = Frame::new(Command::Receipt).header("receipt-id", "1");
        assert_matches!(
            to_message(&frame, Version::V1_2, Transport::SockJs),
            Message::Text(t) if t.as_str() == r#"a["RECEIPT\nreceipt-id:1\n\n\u0000"]"#
        );
    }
}
