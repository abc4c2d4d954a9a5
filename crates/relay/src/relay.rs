//! Room relay: stateless forwarding of room-scoped messages.
//!
//! The relay keeps no per-room state and no membership list. Each inbound
//! message is remapped to its outbound topic and handed to a
//! [`Publisher`]; who receives it is decided entirely by the publisher's
//! subscription set.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use wecode_core::room::{RelayKind, RoomId};

use crate::route::RelayRoute;

/// A message ready for fan-out on a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub body: Bytes,
    /// Sender's content type, forwarded as-is.
    pub content_type: Option<String>,
}

/// Fan-out side of the transport.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `message` to every current subscriber of its topic and
    /// return how many subscriptions it was handed to.
    async fn publish(&self, message: Outbound) -> usize;
}

pub struct RoomRelay {
    publisher: Arc<dyn Publisher>,
}

impl RoomRelay {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Compute the outbound message for an inbound one.
    ///
    /// Payload bytes pass through untouched, except that `InitRequest`
    /// always goes out empty whatever the sender attached.
    pub fn route(
        kind: RelayKind,
        room: &RoomId,
        payload: Bytes,
        content_type: Option<&str>,
    ) -> Outbound {
        let topic = RelayRoute::new(kind, room.clone()).topic();
        if kind.carries_payload() {
            Outbound {
                topic,
                body: payload,
                content_type: content_type.map(str::to_string),
            }
        } else {
            Outbound {
                topic,
                body: Bytes::new(),
                content_type: None,
            }
        }
    }

    /// Forward one inbound message. Returns the number of deliveries.
    pub async fn relay(
        &self,
        kind: RelayKind,
        room: &RoomId,
        payload: Bytes,
        content_type: Option<&str>,
    ) -> usize {
        let bytes = payload.len();
        let outbound = Self::route(kind, room, payload, content_type);
        let topic = outbound.topic.clone();
        let delivered = self.publisher.publish(outbound).await;
        tracing::debug!(
            room_id = %room,
            kind = %kind,
            topic = %topic,
            bytes,
            delivered,
            "Relayed room message",
        );
        delivered
    }
}
