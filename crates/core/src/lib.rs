//! Shared data model for the WeCode coordination layer.
//!
//! Everything here is transport-neutral: the job model shared with the
//! external worker pool, and the room/relay vocabulary shared with the
//! collaborative-editing clients.

pub mod error;
pub mod job;
pub mod room;
pub mod types;
