//! In-process topic broker.
//!
//! Holds the subscription set for every topic and turns published
//! [`Outbound`] messages into STOMP `MESSAGE` frames on each subscriber's
//! outbound channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::frame::{Command, Frame, HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE, HEADER_DESTINATION};
use crate::relay::{Outbound, Publisher};

/// Channel sender half for pushing frames to one connection.
pub type FrameSender = mpsc::UnboundedSender<Frame>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SubscriptionKey {
    conn_id: String,
    sub_id: String,
}

#[derive(Default)]
struct Subscriptions {
    /// topic -> subscriptions on it.
    by_topic: HashMap<String, HashMap<SubscriptionKey, FrameSender>>,
    /// conn_id -> (sub_id -> topic), for unsubscribe and connection cleanup.
    by_conn: HashMap<String, HashMap<String, String>>,
}

impl Subscriptions {
    fn remove(&mut self, key: &SubscriptionKey, topic: &str) {
        if let Some(subs) = self.by_topic.get_mut(topic) {
            subs.remove(key);
            if subs.is_empty() {
                self.by_topic.remove(topic);
            }
        }
    }
}

/// Thread-safe via interior `RwLock`; shared as `Arc<TopicBroker>`.
pub struct TopicBroker {
    subscriptions: RwLock<Subscriptions>,
    next_message_id: AtomicU64,
}

impl TopicBroker {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Subscriptions::default()),
            next_message_id: AtomicU64::new(0),
        }
    }

    /// Subscribe `conn_id` to `topic` under the client-chosen `sub_id`.
    ///
    /// Re-using a subscription id on the same connection replaces the
    /// earlier subscription.
    pub async fn subscribe(&self, conn_id: &str, sub_id: &str, topic: &str, sender: FrameSender) {
        let key = SubscriptionKey {
            conn_id: conn_id.to_string(),
            sub_id: sub_id.to_string(),
        };
        let mut subs = self.subscriptions.write().await;

        let previous = subs
            .by_conn
            .entry(conn_id.to_string())
            .or_default()
            .insert(sub_id.to_string(), topic.to_string());
        if let Some(previous) = previous {
            subs.remove(&key, &previous);
        }

        subs.by_topic
            .entry(topic.to_string())
            .or_default()
            .insert(key, sender);
        tracing::debug!(conn_id, sub_id, topic, "Subscribed");
    }

    /// Drop one subscription. Returns `false` if it did not exist.
    pub async fn unsubscribe(&self, conn_id: &str, sub_id: &str) -> bool {
        let mut subs = self.subscriptions.write().await;
        let Some(topic) = subs
            .by_conn
            .get_mut(conn_id)
            .and_then(|by_id| by_id.remove(sub_id))
        else {
            return false;
        };
        if subs.by_conn.get(conn_id).is_some_and(HashMap::is_empty) {
            subs.by_conn.remove(conn_id);
        }
        let key = SubscriptionKey {
            conn_id: conn_id.to_string(),
            sub_id: sub_id.to_string(),
        };
        subs.remove(&key, &topic);
        tracing::debug!(conn_id, sub_id, topic = %topic, "Unsubscribed");
        true
    }

    /// Drop every subscription held by `conn_id`. Returns how many there were.
    pub async fn remove_connection(&self, conn_id: &str) -> usize {
        let mut subs = self.subscriptions.write().await;
        let Some(by_id) = subs.by_conn.remove(conn_id) else {
            return 0;
        };
        let count = by_id.len();
        for (sub_id, topic) in by_id {
            let key = SubscriptionKey {
                conn_id: conn_id.to_string(),
                sub_id,
            };
            subs.remove(&key, &topic);
        }
        count
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .by_topic
            .get(topic)
            .map_or(0, HashMap::len)
    }

    pub async fn topic_count(&self) -> usize {
        self.subscriptions.read().await.by_topic.len()
    }
}

impl Default for TopicBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for TopicBroker {
    /// Subscribers whose channels are closed are skipped; their connection
    /// cleanup removes them.
    async fn publish(&self, message: Outbound) -> usize {
        let subs = self.subscriptions.read().await;
        let Some(targets) = subs.by_topic.get(&message.topic) else {
            return 0;
        };

        let content_length = message.body.len().to_string();
        let mut delivered = 0;
        for (key, sender) in targets {
            let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
            let mut frame = Frame::new(Command::Message)
                .header(HEADER_DESTINATION, message.topic.as_str())
                .header("subscription", key.sub_id.as_str())
                .header("message-id", message_id.to_string());
            if let Some(content_type) = &message.content_type {
                frame = frame.header(HEADER_CONTENT_TYPE, content_type.as_str());
            }
            let frame = frame
                .header(HEADER_CONTENT_LENGTH, content_length.as_str())
                .with_body(message.body.clone());

            if sender.send(frame).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn outbound(topic: &str, body: &'static [u8]) -> Outbound {
        Outbound {
            topic: topic.to_string(),
            body: Bytes::from_static(body),
            content_type: None,
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_of_the_topic() {
        let broker = TopicBroker::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        broker.subscribe("c1", "0", "/topic/a", tx1).await;
        broker.subscribe("c2", "sub-7", "/topic/a", tx2).await;
        broker.subscribe("c3", "0", "/topic/b", tx3).await;

        assert_eq!(broker.publish(outbound("/topic/a", b"hello")).await, 2);

        let f1 = rx1.recv().await.unwrap();
        let f2 = rx2.recv().await.unwrap();
        assert_eq!(f1.command, Command::Message);
        assert_eq!(f1.get("destination"), Some("/topic/a"));
        assert_eq!(f1.get("subscription"), Some("0"));
        assert_eq!(f2.get("subscription"), Some("sub-7"));
        assert_eq!(f1.get("content-length"), Some("5"));
        assert_eq!(&f1.body[..], b"hello");
        assert_ne!(f1.get("message-id"), f2.get("message-id"));
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_delivers_nothing() {
        let broker = TopicBroker::new();
        assert_eq!(broker.publish(outbound("/topic/none", b"x")).await, 0);
    }

    #[tokio::test]
    async fn content_type_is_forwarded() {
        let broker = TopicBroker::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broker.subscribe("c1", "0", "/topic/a", tx).await;

        let mut message = outbound("/topic/a", b"{}");
        message.content_type = Some("application/json".into());
        broker.publish(message).await;

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.get("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let broker = TopicBroker::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broker.subscribe("c1", "0", "/topic/a", tx).await;

        assert!(broker.unsubscribe("c1", "0").await);
        assert!(!broker.unsubscribe("c1", "0").await);
        assert_eq!(broker.publish(outbound("/topic/a", b"x")).await, 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(broker.topic_count().await, 0);
    }

    #[tokio::test]
    async fn reused_subscription_id_moves_the_subscription() {
        let broker = TopicBroker::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        broker.subscribe("c1", "0", "/topic/a", tx.clone()).await;
        broker.subscribe("c1", "0", "/topic/b", tx).await;

        assert_eq!(broker.subscriber_count("/topic/a").await, 0);
        assert_eq!(broker.subscriber_count("/topic/b").await, 1);
    }

    #[tokio::test]
    async fn remove_connection_drops_all_its_subscriptions() {
        let broker = TopicBroker::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        broker.subscribe("c1", "0", "/topic/a", tx1.clone()).await;
        broker.subscribe("c1", "1", "/topic/b", tx1).await;
        broker.subscribe("c2", "0", "/topic/a", tx2).await;

        assert_eq!(broker.remove_connection("c1").await, 2);
        assert_eq!(broker.remove_connection("c1").await, 0);
        assert_eq!(broker.subscriber_count("/topic/a").await, 1);
        assert_eq!(broker.subscriber_count("/topic/b").await, 0);
    }

    #[tokio::test]
    async fn closed_subscriber_is_skipped() {
        let broker = TopicBroker::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        broker.subscribe("c1", "0", "/topic/a", tx1).await;
        broker.subscribe("c2", "0", "/topic/a", tx2).await;
        drop(rx1);

        assert_eq!(broker.publish(outbound("/topic/a", b"still here")).await, 1);
        assert_eq!(&rx2.recv().await.unwrap().body[..], b"still here");
    }
}
