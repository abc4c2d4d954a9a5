//! Redis-backed [`JobStore`].
//!
//! Status records are hashes (`HSET` / `HGETALL`); the queue is a list fed
//! with `LPUSH` and drained with `BRPOP`, which gives FIFO order.

use std::time::Duration;

use async_trait::async_trait;
use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use tokio::sync::Mutex;
use wecode_core::job::StatusRecord;

use super::JobStore;
use crate::error::StoreError;

pub struct RedisJobStore {
    client: ::redis::Client,
    conn: MultiplexedConnection,
    /// Idle connections for blocking pops. Redis serves commands on one
    /// connection in order, so each waiting `BRPOP` holds a connection of
    /// its own; concurrent consumers never queue behind each other's waits.
    blocking: Mutex<Vec<MultiplexedConnection>>,
}

impl RedisJobStore {
    /// Open a client for `url` and establish the shared connection.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to Redis job store");
        Ok(Self {
            client,
            conn,
            blocking: Mutex::new(Vec::new()),
        })
    }

    /// Take an idle blocking connection, or open a new one.
    async fn checkout_blocking(&self) -> Result<MultiplexedConnection, StoreError> {
        if let Some(conn) = self.blocking.lock().await.pop() {
            return Ok(conn);
        }
        tracing::debug!("Opening Redis connection for blocking pops");
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn checkin_blocking(&self, conn: MultiplexedConnection) {
        self.blocking.lock().await.push(conn);
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn put_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn fields(&self, key: &str) -> Result<StatusRecord, StoreError> {
        let mut conn = self.conn.clone();
        let record: StatusRecord = conn.hgetall(key).await?;
        Ok(record)
    }

    async fn push(&self, queue: &str, item: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.lpush(queue, item).await?;
        Ok(len)
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, StoreError> {
        if timeout.is_zero() {
            // BRPOP treats a zero timeout as "block forever".
            let mut conn = self.conn.clone();
            let item: Option<String> = conn.rpop(queue, None).await?;
            return Ok(item);
        }

        let mut conn = self.checkout_blocking().await?;
        // A connection whose command failed is dropped, not returned.
        let popped: Option<(String, String)> = conn.brpop(queue, timeout.as_secs_f64()).await?;
        self.checkin_blocking(conn).await;
        Ok(popped.map(|(_, item)| item))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
