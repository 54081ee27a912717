//! # Change Events
//!
//! Best-effort notification of committed user mutations.

pub mod channel;
pub mod errors;
pub mod observer;
pub mod publisher;

pub use channel::{spawn_log_consumer, ChannelProducer, Message, MessageReceiver};
pub use errors::{NotifyError, NotifyResult};
pub use observer::{Change, ChangeKind, ChangeObserver};
pub use publisher::{MessageProducer, TopicConfig, TopicPublisher};
