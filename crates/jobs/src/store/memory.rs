//! In-process [`JobStore`] for tests and single-node development.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;
use wecode_core::job::StatusRecord;

use super::JobStore;
use crate::error::StoreError;

/// Hash maps behind tokio locks, with a [`Notify`] to wake blocked pops.
///
/// Queues are stored newest-first so `push` / `pop` mirror Redis'
/// `LPUSH` / `BRPOP` pairing.
#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, StatusRecord>>,
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length of `queue`.
    pub async fn queue_len(&self, queue: &str) -> usize {
        self.queues.lock().await.get(queue).map_or(0, VecDeque::len)
    }

    async fn try_pop(&self, queue: &str) -> Option<String> {
        self.queues
            .lock()
            .await
            .get_mut(queue)
            .and_then(VecDeque::pop_back)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.entry(key.to_string()).or_default();
        for (field, value) in fields {
            record.insert((*field).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn fields(&self, key: &str) -> Result<StatusRecord, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn push(&self, queue: &str, item: &str) -> Result<u64, StoreError> {
        let len = {
            let mut queues = self.queues.lock().await;
            let entries = queues.entry(queue.to_string()).or_default();
            entries.push_front(item.to_string());
            entries.len() as u64
        };
        self.pushed.notify_waiters();
        Ok(len)
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent push between
            // the check and the wait is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop(queue).await {
                return Ok(Some(item));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn absent_key_has_no_fields() {
        let store = MemoryJobStore::new();
        assert!(store.fields("job:missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_fields_merges_into_existing_record() {
        let store = MemoryJobStore::new();
        store.put_fields("k", &[("status", "pending")]).await.unwrap();
        store
            .put_fields("k", &[("status", "done"), ("output", "1")])
            .await
            .unwrap();

        let record = store.fields("k").await.unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record["status"], "done");
        assert_eq!(record["output"], "1");
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let store = MemoryJobStore::new();
        assert_eq!(store.push("q", "first").await.unwrap(), 1);
        assert_eq!(store.push("q", "second").await.unwrap(), 2);

        assert_eq!(store.pop("q", Duration::ZERO).await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.pop("q", Duration::ZERO).await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.pop("q", Duration::ZERO).await.unwrap(), None);
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let store = MemoryJobStore::new();
        store.push("a", "x").await.unwrap();
        assert_eq!(store.pop("b", Duration::ZERO).await.unwrap(), None);
        assert_eq!(store.queue_len("a").await, 1);
    }

    #[tokio::test]
    async fn pop_times_out_on_empty_queue() {
        let store = MemoryJobStore::new();
        let popped = store.pop("q", Duration::from_millis(20)).await.unwrap();
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn blocked_pop_wakes_on_push() {
        let store = Arc::new(MemoryJobStore::new());

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.pop("q", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.push("q", "late").await.unwrap();

        let popped = waiter.await.unwrap().unwrap();
        assert_eq!(popped.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn each_item_is_popped_at_most_once() {
        let store = Arc::new(MemoryJobStore::new());
        for i in 0..50 {
            store.push("q", &i.to_string()).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(item) = store.pop("q", Duration::ZERO).await.unwrap() {
                    got.push(item);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_by_key(|s| s.parse::<u32>().unwrap());
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(all, expected);
    }
}
