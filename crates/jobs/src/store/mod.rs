//! Shared job store abstraction.
//!
//! The store provides the only shared mutable state of the job subsystem:
//! a FIFO queue of opaque strings and a mapping from key to field set.
//! Implementations are responsible for making both safe under concurrent
//! access (atomic pop, atomic multi-field write); callers never lock.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use wecode_core::job::StatusRecord;

use crate::error::StoreError;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Write `fields` into the field set at `key`, creating it if needed.
    /// All fields land atomically.
    async fn put_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError>;

    /// Return every field stored at `key`. An absent key yields an empty map.
    async fn fields(&self, key: &str) -> Result<StatusRecord, StoreError>;

    /// Push `item` onto the tail of `queue`, returning the new queue length.
    async fn push(&self, queue: &str, item: &str) -> Result<u64, StoreError>;

    /// Pop the item at the head of `queue`, waiting up to `timeout` for one
    /// to arrive. `Duration::ZERO` checks once without waiting.
    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, StoreError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), StoreError>;
}
