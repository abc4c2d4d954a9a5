//! SockJS WebSocket transport framing.
//!
//! Clients that go through a SockJS library open
//! `/ws/{server}/{session}/websocket` and wrap every STOMP frame in the
//! SockJS envelope: the server opens with `o`, sends `a["..."]` arrays of
//! messages and closes with `c[code,"reason"]`; the client sends JSON
//! arrays of strings. Only the WebSocket transport is served, so `/info`
//! always reports `websocket: true`.

use axum::Json;
use serde::Serialize;
use serde_json::json;

pub const OPEN_FRAME: &str = "o";

/// Close code and reason sent when the server ends a session.
const GO_AWAY: (u16, &str) = (3000, "Go away!");

/// `a[...]` frame carrying one message.
pub fn message_frame(payload: &str) -> String {
    format!("a{}", json!([payload]))
}

pub fn close_frame() -> String {
    let (code, reason) = GO_AWAY;
    format!("c{}", json!([code, reason]))
}

/// Messages in one client frame: a JSON array of strings, or a single
/// JSON string. An empty frame carries nothing.
pub fn decode_messages(text: &str) -> Result<Vec<String>, serde_json::Error> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if text.starts_with('[') {
        serde_json::from_str(text)
    } else {
        serde_json::from_str::<String>(text).map(|m| vec![m])
    }
}

/// `GET /ws/info` payload.
#[derive(Serialize)]
pub struct InfoResponse {
    pub websocket: bool,
    pub cookie_needed: bool,
    pub origins: Vec<&'static str>,
    pub entropy: u32,
}

/// GET /ws/info -- transport capabilities requested by SockJS clients.
pub async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        websocket: true,
        cookie_needed: false,
        origins: vec!["*:*"],
        entropy: uuid::Uuid::new_v4().as_u128() as u32,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn message_frame_escapes_stomp_control_bytes() {
        assert_eq!(
            message_frame("SEND\ndestination:/x\n\nhi\0"),
            r#"a["SEND\ndestination:/x\n\nhi\u0000"]"#
        );
    }

    #[test]
    fn close_frame_format() {
        assert_eq!(close_frame(), r#"c[3000,"Go away!"]"#);
    }

    #[test]
    fn decodes_array_and_single_string() {
        assert_eq!(
            decode_messages(r#"["CONNECT\n\n\u0000","DISCONNECT\n\n\u0000"]"#).unwrap(),
            vec!["CONNECT\n\n\0".to_string(), "DISCONNECT\n\n\0".to_string()]
        );
        assert_eq!(decode_messages(r#""a""#).unwrap(), vec!["a".to_string()]);
        assert!(decode_messages("").unwrap().is_empty());
        assert_matches!(decode_messages("{not json"), Err(_));
    }
}
