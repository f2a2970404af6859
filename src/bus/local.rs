//! In-process bus built on [`tokio::sync::broadcast`].
//!
//! One broadcast channel per topic, created on first subscription, so
//! every subscriber of a topic sees every message published to it.
//! [`LocalBus::monitor`] taps all topics at once.
//!
//! Publishing waits while any live receiver still has `capacity` unread
//! messages, so a slow subscriber slows the publisher down instead of
//! losing messages.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, broadcast};

use super::{Bus, BusMessage};

/// Per-topic channel capacity unless specified.
const DEFAULT_CAPACITY: usize = 256;

/// How often a blocked publisher looks for room.
const ROOM_POLL: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct LocalBus {
    topics: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
    monitor: broadcast::Sender<BusMessage>,
    capacity: usize,
    // One publisher at a time, so two waiters cannot both fill the last slot.
    sending: Mutex<()>,
}

impl LocalBus {
    /// Create a bus whose per-topic channels hold `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let (monitor, _) = broadcast::channel(capacity);
        Self {
            topics: RwLock::new(HashMap::new()),
            monitor,
            capacity,
            sending: Mutex::new(()),
        }
    }

    async fn send_when_room(&self, tx: &broadcast::Sender<BusMessage>, message: BusMessage) {
        while tx.receiver_count() > 0 && tx.len() >= self.capacity {
            tokio::time::sleep(ROOM_POLL).await;
        }
        // Sending with no receivers is fine on a bus.
        let _ = tx.send(message);
    }

    /// Receive every message published on any topic from now on.
    pub fn monitor(&self) -> broadcast::Receiver<BusMessage> {
        self.monitor.subscribe()
    }

    /// Number of live subscribers on `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<BusMessage>> {
        let mut topics = self.topics.write().await;
        let tx = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(tx.subscribe())
    }

    async fn publish(&self, message: BusMessage) -> Result<()> {
        log::trace!("publish {} on {}", message.id, message.topic);
        let topic = self.topics.read().await.get(&message.topic).cloned();

        let _sending = self.sending.lock().await;
        self.send_when_room(&self.monitor, message.clone()).await;
        if let Some(tx) = topic {
            self.send_when_room(&tx, message).await;
        }
        Ok(())
    }
}
