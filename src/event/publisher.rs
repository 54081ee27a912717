//! # Topic Publisher
//!
//! The production [`ChangeObserver`]: publishes the changed user's id, JSON
//! encoded, to one topic per change kind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::NotifyResult;
use super::observer::{Change, ChangeKind, ChangeObserver};
use crate::context::RequestContext;

/// Something that can put a payload on a topic
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> NotifyResult<()>;
}

/// Topic names per change kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    #[serde(default = "default_created_topic")]
    pub created: String,

    #[serde(default = "default_updated_topic")]
    pub updated: String,

    #[serde(default = "default_deleted_topic")]
    pub deleted: String,
}

fn default_created_topic() -> String {
    "user.created".to_string()
}

fn default_updated_topic() -> String {
    "user.updated".to_string()
}

fn default_deleted_topic() -> String {
    "user.deleted".to_string()
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            created: default_created_topic(),
            updated: default_updated_topic(),
            deleted: default_deleted_topic(),
        }
    }
}

impl TopicConfig {
    pub fn topic_for(&self, kind: ChangeKind) -> &str {
        match kind {
            ChangeKind::Created => &self.created,
            ChangeKind::Updated => &self.updated,
            ChangeKind::Deleted => &self.deleted,
        }
    }
}

pub struct TopicPublisher<P> {
    producer: P,
    topics: TopicConfig,
}

impl<P: MessageProducer> TopicPublisher<P> {
    pub fn new(producer: P) -> Self {
        Self::with_topics(producer, TopicConfig::default())
    }

    pub fn with_topics(producer: P, topics: TopicConfig) -> Self {
        Self { producer, topics }
    }
}

#[async_trait]
impl<P: MessageProducer> ChangeObserver for TopicPublisher<P> {
    fn name(&self) -> &str {
        "topic-publisher"
    }

    async fn notify(&self, _ctx: &RequestContext, change: &Change<'_>) -> NotifyResult<()> {
        let payload = serde_json::to_vec(change.id)?;
        let topic = self.topics.topic_for(change.kind);

        tracing::debug!(topic, user_id = change.id, "publishing change");
        self.producer.publish(topic, payload).await
    }
}
