//! Asynchronous job dispatch and status lookup.
//!
//! - [`JobStore`]: the shared key/value store (queue + per-job field map),
//!   with a Redis backend and an in-memory backend.
//! - [`JobDispatcher`]: accepts submissions and enqueues work items.
//! - [`JobStatusReader`]: returns the current status record of a job.
//! - [`QueueConsumer`]: worker-side helper that follows the shared
//!   status-record contract.

pub mod dispatcher;
pub mod error;
pub mod status;
pub mod store;
pub mod worker;

pub use dispatcher::JobDispatcher;
pub use error::{JobsError, StoreError};
pub use status::JobStatusReader;
pub use store::memory::MemoryJobStore;
pub use store::redis::RedisJobStore;
pub use store::JobStore;
pub use worker::{JobOutcome, QueueConsumer};
