//! Room-scoped publish/subscribe relay for collaborative editing.
//!
//! - [`RoomRelay`]: stateless remapping of room messages onto topics.
//! - [`route`]: the destination/topic naming scheme.
//! - [`TopicBroker`]: in-process subscription set and fan-out.
//! - [`frame`] / [`session`]: the STOMP wire protocol clients speak.

pub mod broker;
pub mod frame;
pub mod relay;
pub mod route;
pub mod session;

pub use broker::{FrameSender, TopicBroker};
pub use frame::{Command, Frame, FrameError, Version};
pub use relay::{Outbound, Publisher, RoomRelay};
pub use route::{RelayRoute, RouteError};
pub use session::{SessionError, SessionFlow, StompSession};
