//! Per-connection STOMP session.
//!
//! The session is the protocol state machine sitting between one client
//! connection and the broker / relay. It owns no I/O: the caller feeds it
//! raw inbound bytes and drains outbound frames from the channel it was
//! built with.

use std::sync::Arc;

use tokio::sync::watch;
use wecode_core::room::RelayKind;

use crate::broker::{FrameSender, TopicBroker};
use crate::frame::{
    Command, Frame, FrameError, Version, HEADER_CONTENT_TYPE, HEADER_DESTINATION, HEADER_ID,
    HEADER_RECEIPT,
};
use crate::relay::{Outbound, Publisher, RoomRelay};
use crate::route::{RelayRoute, RouteError, TOPIC_PREFIX};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("not connected; send CONNECT first")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    #[error("no supported protocol version in '{0}'")]
    UnsupportedVersion(String),

    #[error("{command} frame is missing required header '{header}'")]
    MissingHeader {
        command: Command,
        header: &'static str,
    },

    #[error("subscriptions must target a /topic/ destination, got '{0}'")]
    InvalidSubscription(String),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("{0} frames are not supported")]
    Unsupported(Command),

    #[error("{0} is a server frame")]
    ServerFrame(Command),
}

/// What the connection should do after a frame has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    Close,
}

pub struct StompSession {
    conn_id: String,
    outbound: FrameSender,
    broker: Arc<TopicBroker>,
    relay: Arc<RoomRelay>,
    /// `None` until CONNECT has been accepted.
    version: watch::Sender<Option<Version>>,
}

impl StompSession {
    pub fn new(
        conn_id: impl Into<String>,
        outbound: FrameSender,
        broker: Arc<TopicBroker>,
        relay: Arc<RoomRelay>,
    ) -> Self {
        Self {
            conn_id: conn_id.into(),
            outbound,
            broker,
            relay,
            version: watch::Sender::new(None),
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn is_connected(&self) -> bool {
        self.version().is_some()
    }

    /// Protocol version negotiated at CONNECT.
    pub fn version(&self) -> Option<Version> {
        *self.version.borrow()
    }

    /// Follow the negotiated version from the task that writes outbound
    /// frames to the wire. It is set before CONNECTED is queued.
    pub fn watch_version(&self) -> watch::Receiver<Option<Version>> {
        self.version.subscribe()
    }

    /// Handle one inbound transport message, which may hold zero (a
    /// heart-beat) or more frames.
    pub async fn handle_bytes(&mut self, data: &[u8]) -> SessionFlow {
        let version = self.version().unwrap_or(Version::V1_2);
        let frames = match Frame::decode_all_for(data, version) {
            Ok(frames) => frames,
            Err(e) => return self.fail(&SessionError::Frame(e), None),
        };
        for frame in frames {
            if self.handle_frame(frame).await == SessionFlow::Close {
                return SessionFlow::Close;
            }
        }
        SessionFlow::Continue
    }

    pub async fn handle_frame(&mut self, frame: Frame) -> SessionFlow {
        match self.dispatch(&frame).await {
            Ok(flow) => flow,
            Err(e) => self.fail(&e, frame.get(HEADER_RECEIPT)),
        }
    }

    /// Release everything the connection holds in the broker.
    pub async fn close(&self) {
        let dropped = self.broker.remove_connection(&self.conn_id).await;
        tracing::debug!(conn_id = %self.conn_id, dropped, "STOMP session closed");
    }

    async fn dispatch(&mut self, frame: &Frame) -> Result<SessionFlow, SessionError> {
        match frame.command {
            Command::Connect | Command::Stomp => return self.connect(frame),
            Command::Connected | Command::Message | Command::Receipt | Command::Error => {
                return Err(SessionError::ServerFrame(frame.command));
            }
            _ if !self.is_connected() => return Err(SessionError::NotConnected),
            _ => {}
        }

        match frame.command {
            Command::Subscribe => {
                let id = required(frame, HEADER_ID)?;
                let destination = required(frame, HEADER_DESTINATION)?;
                if !destination.starts_with(&format!("{TOPIC_PREFIX}/")) {
                    return Err(SessionError::InvalidSubscription(destination.to_string()));
                }
                self.broker
                    .subscribe(&self.conn_id, id, destination, self.outbound.clone())
                    .await;
            }
            Command::Unsubscribe => {
                let id = required(frame, HEADER_ID)?;
                if !self.broker.unsubscribe(&self.conn_id, id).await {
                    tracing::debug!(conn_id = %self.conn_id, sub_id = id, "Unsubscribe for unknown id");
                }
            }
            Command::Send => {
                let destination = required(frame, HEADER_DESTINATION)?;
                if destination.starts_with(&format!("{TOPIC_PREFIX}/")) {
                    self.publish_direct(destination, frame).await;
                    self.send_receipt(frame);
                    return Ok(SessionFlow::Continue);
                }
                let route = RelayRoute::parse(destination)?;
                if route.kind == RelayKind::InitRequest {
                    tracing::debug!(conn_id = %self.conn_id, room_id = %route.room, "Snapshot requested");
                }
                self.relay
                    .relay(
                        route.kind,
                        &route.room,
                        frame.body.clone(),
                        frame.get(HEADER_CONTENT_TYPE),
                    )
                    .await;
            }
            Command::Disconnect => {
                self.send_receipt(frame);
                return Ok(SessionFlow::Close);
            }
            other => return Err(SessionError::Unsupported(other)),
        }

        self.send_receipt(frame);
        Ok(SessionFlow::Continue)
    }

    fn connect(&mut self, frame: &Frame) -> Result<SessionFlow, SessionError> {
        if self.is_connected() {
            return Err(SessionError::AlreadyConnected);
        }
        // A client that names no version speaks 1.0.
        let offered = frame.get("accept-version").unwrap_or("1.0");
        let version = Version::SUPPORTED
            .into_iter()
            .find(|v| offered.split(',').any(|o| o.trim() == v.as_str()))
            .ok_or_else(|| SessionError::UnsupportedVersion(offered.to_string()))?;

        self.version.send_replace(Some(version));
        self.send(
            Frame::new(Command::Connected)
                .header("version", version.as_str())
                .header("heart-beat", "0,0")
                .header("server", concat!("wecode-relay/", env!("CARGO_PKG_VERSION")))
                .header("session", self.conn_id.as_str()),
        );
        tracing::debug!(conn_id = %self.conn_id, version = %version, "STOMP session connected");
        Ok(SessionFlow::Continue)
    }

    /// SEND straight to a broker topic: delivered as-is to its subscribers.
    async fn publish_direct(&self, topic: &str, frame: &Frame) {
        let bytes = frame.body.len();
        let delivered = self
            .broker
            .publish(Outbound {
                topic: topic.to_string(),
                body: frame.body.clone(),
                content_type: frame.get(HEADER_CONTENT_TYPE).map(str::to_string),
            })
            .await;
        tracing::debug!(conn_id = %self.conn_id, topic, bytes, delivered, "Published to topic");
    }

    fn send_receipt(&self, frame: &Frame) {
        if let Some(receipt) = frame.get(HEADER_RECEIPT) {
            self.send(Frame::new(Command::Receipt).header("receipt-id", receipt));
        }
    }

    /// Report `error` to the client. The connection must close afterwards.
    fn fail(&self, error: &SessionError, receipt: Option<&str>) -> SessionFlow {
        tracing::debug!(conn_id = %self.conn_id, error = %error, "STOMP protocol error");
        let detail = error.to_string();
        let mut frame = Frame::new(Command::Error).header("message", detail.as_str());
        if let Some(receipt) = receipt {
            frame = frame.header("receipt-id", receipt);
        }
        let frame = frame
            .header("content-type", "text/plain")
            .header("content-length", detail.len().to_string())
            .with_body(detail);
        self.send(frame);
        SessionFlow::Close
    }

    fn send(&self, frame: Frame) {
        // A closed channel means the connection is already going away.
        let _ = self.outbound.send(frame);
    }
}

fn required<'a>(frame: &'a Frame, header: &'static str) -> Result<&'a str, SessionError> {
    frame.get(header).ok_or(SessionError::MissingHeader {
        command: frame.command,
        header,
    })
}
