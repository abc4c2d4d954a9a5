//! Mapping between inbound application destinations and outbound topics.
//!
//! | Kind           | Client sends to                 | Subscribers receive on            |
//! |----------------|---------------------------------|-----------------------------------|
//! | `Sync`         | `/app/room/sync/{roomId}`       | `/topic/room/sync/{roomId}`       |
//! | `InitRequest`  | `/app/room/init/{roomId}`       | `/topic/room/requestInit/{roomId}`|
//! | `InitSnapshot` | `/app/room/provideInit/{roomId}`| `/topic/room/init/{roomId}`       |

use wecode_core::error::CoreError;
use wecode_core::room::{RelayKind, RoomId};

/// Prefix of destinations handled by the application (the relay).
pub const APP_PREFIX: &str = "/app";

/// Prefix of broker topics clients may subscribe to.
pub const TOPIC_PREFIX: &str = "/topic";

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("'{0}' is not a room destination")]
    NotARoomDestination(String),

    #[error("unknown room message kind '{0}'")]
    UnknownKind(String),

    #[error(transparent)]
    InvalidRoom(#[from] CoreError),
}

fn inbound_segment(kind: RelayKind) -> &'static str {
    match kind {
        RelayKind::Sync => "sync",
        RelayKind::InitRequest => "init",
        RelayKind::InitSnapshot => "provideInit",
    }
}

fn outbound_segment(kind: RelayKind) -> &'static str {
    match kind {
        RelayKind::Sync => "sync",
        RelayKind::InitRequest => "requestInit",
        RelayKind::InitSnapshot => "init",
    }
}

/// A parsed room destination: which kind of message, for which room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRoute {
    pub kind: RelayKind,
    pub room: RoomId,
}

impl RelayRoute {
    pub fn new(kind: RelayKind, room: RoomId) -> Self {
        Self { kind, room }
    }

    /// Parse an inbound destination such as `/app/room/sync/abc`.
    pub fn parse(destination: &str) -> Result<Self, RouteError> {
        let rest = destination
            .strip_prefix(APP_PREFIX)
            .and_then(|s| s.strip_prefix("/room/"))
            .ok_or_else(|| RouteError::NotARoomDestination(destination.to_string()))?;
        let (segment, room) = rest
            .split_once('/')
            .ok_or_else(|| RouteError::NotARoomDestination(destination.to_string()))?;
        let kind = RelayKind::ALL
            .into_iter()
            .find(|k| inbound_segment(*k) == segment)
            .ok_or_else(|| RouteError::UnknownKind(segment.to_string()))?;
        Ok(Self {
            kind,
            room: RoomId::parse(room)?,
        })
    }

    /// Destination a client sends this kind of message to.
    pub fn destination(&self) -> String {
        format!("{APP_PREFIX}/room/{}/{}", inbound_segment(self.kind), self.room)
    }

    /// Topic the relayed message is published on.
    pub fn topic(&self) -> String {
        format!("{TOPIC_PREFIX}/room/{}/{}", outbound_segment(self.kind), self.room)
    }
}
