//! Room vocabulary for the collaborative-editing relay.
//!
//! Rooms are implicit: a room exists as soon as a client names it, and the
//! server keeps no registry of them. Document content is never held here.

use std::fmt;

use crate::error::CoreError;

/// Client-supplied room identifier.
///
/// Must be non-empty and must not contain `/`, since it is embedded as a
/// single path segment in destinations and topics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.is_empty() {
            return Err(CoreError::Validation("room id must not be empty".into()));
        }
        if raw.contains('/') {
            return Err(CoreError::Validation(format!(
                "room id '{raw}' must not contain '/'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three room-scoped message kinds the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayKind {
    /// Incremental document update, opaque payload.
    Sync,
    /// "A new participant needs the current document"; carries no payload.
    InitRequest,
    /// Full document snapshot supplied by an existing participant.
    InitSnapshot,
}

impl RelayKind {
    pub const ALL: [RelayKind; 3] = [
        RelayKind::Sync,
        RelayKind::InitRequest,
        RelayKind::InitSnapshot,
    ];

    /// Whether messages of this kind forward the sender's payload.
    pub fn carries_payload(self) -> bool {
        !matches!(self, RelayKind::InitRequest)
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelayKind::Sync => "sync",
            RelayKind::InitRequest => "init_request",
            RelayKind::InitSnapshot => "init_snapshot",
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn room_id_accepts_any_single_segment() {
        assert_eq!(RoomId::parse("abc").unwrap().as_str(), "abc");
        assert_eq!(RoomId::parse("a b-c_ü").unwrap().to_string(), "a b-c_ü");
    }

    #[test]
    fn room_id_rejects_empty_and_nested() {
        assert_matches!(RoomId::parse(""), Err(CoreError::Validation(_)));
        assert_matches!(RoomId::parse("a/b"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn only_init_request_drops_payload() {
        assert!(RelayKind::Sync.carries_payload());
        assert!(RelayKind::InitSnapshot.carries_payload());
        assert!(!RelayKind::InitRequest.carries_payload());
    }
}
