//! # Channel Producer
//!
//! In-process [`MessageProducer`] backed by a bounded tokio channel.
//! Publishing never waits: a full or closed channel is reported as an error.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::errors::{NotifyError, NotifyResult};
use super::publisher::MessageProducer;

/// A published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Receiving half handed to the consumer
pub type MessageReceiver = mpsc::Receiver<Message>;

#[derive(Debug, Clone)]
pub struct ChannelProducer {
    sender: mpsc::Sender<Message>,
}

impl ChannelProducer {
    /// Create a producer and the receiver that drains it
    pub fn new(capacity: usize) -> (Self, MessageReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessageProducer for ChannelProducer {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> NotifyResult<()> {
        let message = Message {
            topic: topic.to_string(),
            payload,
        };
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => NotifyError::ChannelFull,
            TrySendError::Closed(_) => NotifyError::ChannelClosed,
        })
    }
}

/// Drain `receiver`, logging every message, until all producers are dropped.
pub fn spawn_log_consumer(mut receiver: MessageReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            tracing::info!(
                topic = %message.topic,
                payload = %String::from_utf8_lossy(&message.payload),
                "change published"
            );
        }
    })
}
