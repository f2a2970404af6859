//! The pub/sub bus the service talks over.
//!
//! A [`Bus`] delivers [`BusMessage`]s by topic. Requests arrive on a
//! well-known topic; each reply is built with [`Bus::make_response`] so
//! it carries the request's id and lands on the request's private
//! response topic (`tmp.<id>`).

pub mod local;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::consts::RESPONSE_TOPIC_PREFIX;

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub id: String,
    pub topic: String,
    pub content: String,
    /// Topic of the request this message answers, if it is a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,
    /// Milliseconds since the epoch.
    pub time: u64,
}

impl BusMessage {
    /// A fresh message with a random id.
    pub fn new(topic: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            topic: topic.into(),
            content: content.into(),
            in_response_to: None,
            time: now_ms(),
        }
    }

    /// The reply to this message: same id, private response topic.
    pub fn response(&self, content: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            topic: response_topic(&self.id),
            content: content.into(),
            in_response_to: Some(self.topic.clone()),
            time: now_ms(),
        }
    }

    pub fn is_response(&self) -> bool {
        self.in_response_to.is_some()
    }
}

/// Topic the responses to message `id` are published on.
pub fn response_topic(id: &str) -> String {
    format!("{RESPONSE_TOPIC_PREFIX}{id}")
}

/// 16 lowercase hex digits.
fn new_id() -> String {
    let mut rng = rand::rng();
    let n: u64 = rng.random();
    format!("{n:016x}")
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A pub/sub transport. In-process, redis, whatever: the handler only
/// sees this trait.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Receive every message published to `topic` from now on.
    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<BusMessage>>;

    /// Deliver a message to the current subscribers of its topic.
    async fn publish(&self, message: BusMessage) -> Result<()>;

    /// Build the correlated reply to `request`.
    fn make_response(&self, request: &BusMessage, content: String) -> BusMessage {
        request.response(content)
    }
}

/// Something that consumes messages delivered on a topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: BusMessage) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_hex_id() {
        let msg = BusMessage::new("wikipedia", "{}");
        assert_eq!(msg.id.len(), 16);
        assert!(msg.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!msg.is_response());
    }

    #[test]
    fn ids_differ() {
        let a = BusMessage::new("t", "");
        let b = BusMessage::new("t", "");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn response_is_correlated() {
        let req = BusMessage::new("wikipedia", "{}");
        let resp = req.response("{\"summary\": \"x\"}");

        assert_eq!(resp.id, req.id);
        assert_eq!(resp.topic, format!("tmp.{}", req.id));
        assert_eq!(resp.in_response_to.as_deref(), Some("wikipedia"));
        assert!(resp.is_response());
    }

    #[test]
    fn request_serializes_without_in_response_to() {
        let msg = BusMessage::new("wikipedia", "{}");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("in_response_to"));
    }
}
