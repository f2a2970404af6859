use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::{Bus, BusMessage};

/// A bus for tests. Remembers everything published, delivers nothing.
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<BusMessage>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<BusMessage> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Published message bodies parsed as JSON.
    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.published()
            .iter()
            .filter_map(|m| serde_json::from_str(&m.content).ok())
            .collect()
    }
}

#[async_trait]
impl Bus for RecordingBus {
    async fn subscribe(&self, _topic: &str) -> Result<broadcast::Receiver<BusMessage>> {
        let (_, rx) = broadcast::channel(1);
        Ok(rx)
    }

    async fn publish(&self, message: BusMessage) -> Result<()> {
        self.published
            .lock()
            .map_err(|_| anyhow::anyhow!("RecordingBus: lock poisoned"))?
            .push(message);
        Ok(())
    }
}
